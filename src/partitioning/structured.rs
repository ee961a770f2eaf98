//! Structured domain decomposition for meshes of the unit square/cube.
//!
//! Each element goes to the box containing its maximal corner. For very
//! large meshes [`create_dd`] redistributes in stages: it first assigns at
//! coarser box shapes (each embedded into the full process grid by stride)
//! and transfers after each stage, which bounds the volume of any single
//! transfer session.

use crate::algs::collective::global_max_u64;
use crate::algs::communicator::{CommTag, Communicator};
use crate::geometry::max_corner;
use crate::mesh_error::MeshDistribError;
use crate::replication::middleware::ReplicationMiddleware;
use crate::replication::transfer::transfer_from_level;
use crate::topology::context::ProcessContext;
use crate::topology::multigrid::{MultiGrid, Rank};
use std::fmt;

/// Element count above which [`create_dd`] redistributes in stages.
pub const DEFAULT_DD_THRESHOLD: usize = 20_000;
/// Corners are shifted by this before box lookup so faces on a box
/// boundary fall into the lower box.
pub const DEFAULT_DD_EPSILON: f64 = 1e-5;

const DD_TAG: CommTag = CommTag::new(0x4400);

/// Box counts per axis; `depth == 1` for 2-D decompositions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BoxShape {
    pub hor: usize,
    pub vert: usize,
    pub depth: usize,
}

impl BoxShape {
    pub fn new(hor: usize, vert: usize) -> Self {
        Self {
            hor,
            vert,
            depth: 1,
        }
    }

    pub fn new3(hor: usize, vert: usize, depth: usize) -> Self {
        Self { hor, vert, depth }
    }

    /// Total number of boxes, `None` if the product overflows.
    pub fn checked_cells(&self) -> Option<usize> {
        self.hor.checked_mul(self.vert)?.checked_mul(self.depth)
    }

    /// Total number of boxes, saturating at `usize::MAX`.
    pub fn cells(&self) -> usize {
        self.checked_cells().unwrap_or(usize::MAX)
    }

    /// Halve the first axis with an even box count.
    pub fn halved(&self) -> Option<Self> {
        if self.hor % 2 == 0 {
            Some(Self {
                hor: self.hor / 2,
                ..*self
            })
        } else if self.vert % 2 == 0 {
            Some(Self {
                vert: self.vert / 2,
                ..*self
            })
        } else if self.depth % 2 == 0 {
            Some(Self {
                depth: self.depth / 2,
                ..*self
            })
        } else {
            None
        }
    }

    /// Rank of box `(i, j, k)` when this shape is embedded into `full`.
    fn embedded_rank(&self, [i, j, k]: [usize; 3], full: &BoxShape) -> Rank {
        let (sx, sy, sz) = (
            full.hor / self.hor,
            full.vert / self.vert,
            full.depth / self.depth,
        );
        i * sx + j * sy * full.hor + k * sz * full.hor * full.vert
    }
}

impl fmt::Display for BoxShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.depth == 1 {
            write!(f, "{}x{}", self.hor, self.vert)
        } else {
            write!(f, "{}x{}x{}", self.hor, self.vert, self.depth)
        }
    }
}

fn box_index(c: f64, n: usize, eps: f64) -> usize {
    assert!(
        c > -eps && c < 1.0 + eps,
        "coordinate {c} outside the unit domain"
    );
    let idx = ((c - eps) * n as f64).floor().max(0.0) as usize;
    assert!(idx < n, "box index {idx} out of range for {n} boxes");
    idx
}

/// Box of a point for `shape`.
///
/// # Panics
/// Panics if a used coordinate lies outside the unit domain.
pub fn box_of(point: [f64; 3], shape: &BoxShape, eps: f64) -> [usize; 3] {
    let k = if shape.depth > 1 {
        box_index(point[2], shape.depth, eps)
    } else {
        0
    };
    [
        box_index(point[0], shape.hor, eps),
        box_index(point[1], shape.vert, eps),
        k,
    ]
}

/// Assign every Master element of `level` to the box of its maximal corner, with
/// `shape` embedded into `full`. Returns the number of elements assigned.
pub fn assign_boxes(
    mg: &mut MultiGrid,
    level: usize,
    shape: &BoxShape,
    full: &BoxShape,
    eps: f64,
) -> Result<usize, MeshDistribError> {
    let elements = mg.masters_on(level)?;
    for &e in &elements {
        let b = box_of(max_corner(mg, e)?, shape, eps);
        mg.set_partition(e, shape.embedded_rank(b, full))?;
    }
    Ok(elements.len())
}

/// One-shot structured decomposition of `level` onto `shape`.
///
/// # Panics
/// Panics if `shape` does not have exactly `procs` boxes, or if an element
/// corner lies outside the unit domain.
pub fn structured_decomposition(
    mg: &mut MultiGrid,
    level: usize,
    shape: &BoxShape,
    procs: usize,
    eps: f64,
) -> Result<usize, MeshDistribError> {
    assert_eq!(
        shape.cells(),
        procs,
        "box shape {shape} does not match {procs} processes"
    );
    assign_boxes(mg, level, shape, shape, eps)
}

/// Box shapes to run, coarsest first and ending with `full`.
///
/// Halving continues while the largest per-process element count exceeds
/// `threshold`, at least four boxes remain, and some axis is even.
pub fn plan_stages(full: BoxShape, global_max: usize, threshold: usize) -> Vec<BoxShape> {
    let mut stages = vec![full];
    if global_max > threshold {
        let mut cur = full;
        while cur.cells() >= 4 {
            match cur.halved() {
                Some(next) => {
                    stages.push(next);
                    cur = next;
                }
                None => break,
            }
        }
    }
    stages.reverse();
    stages
}

/// Structured decomposition with staged redistribution.
///
/// Performs one global maximum reduction of the local element count on
/// `level`, runs an intermediate transfer for every coarser stage, and
/// leaves the final assignment (at `shape`) in the destination attributes;
/// the caller runs the final transfer.
pub fn create_dd<C, M>(
    mg: &mut MultiGrid,
    level: usize,
    shape: &BoxShape,
    ctx: &ProcessContext,
    comm: &C,
    mw: &mut M,
    threshold: usize,
    eps: f64,
) -> Result<Vec<BoxShape>, MeshDistribError>
where
    C: Communicator,
    M: ReplicationMiddleware,
{
    assert_eq!(
        shape.cells(),
        ctx.size(),
        "box shape {shape} does not match {} processes",
        ctx.size()
    );
    let local = mg.grid(level)?.element_count() as u64;
    let global_max = global_max_u64(comm, DD_TAG, local)? as usize;
    let stages = plan_stages(*shape, global_max, threshold);
    if stages.len() > 1 {
        log::info!(
            "dd: {global_max} elements on the fullest process exceed {threshold}, staging {}",
            stages
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        );
    }
    for (i, stage) in stages.iter().enumerate() {
        mg.reset_partitions(ctx.rank());
        assign_boxes(mg, level, stage, shape, eps)?;
        if i + 1 < stages.len() {
            log::debug!("dd: intermediate transfer at {stage}");
            transfer_from_level(mg, ctx, mw, level)?;
        }
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_from_max_corner() {
        let s = BoxShape::new(4, 2);
        assert_eq!(box_of([0.25, 0.5, 0.0], &s, DEFAULT_DD_EPSILON), [0, 0, 0]);
        assert_eq!(box_of([0.26, 0.51, 0.0], &s, DEFAULT_DD_EPSILON), [1, 1, 0]);
        assert_eq!(box_of([1.0, 1.0, 0.0], &s, DEFAULT_DD_EPSILON), [3, 1, 0]);
    }

    #[test]
    #[should_panic(expected = "outside the unit domain")]
    fn coordinates_outside_unit_domain_panic() {
        box_of([1.5, 0.5, 0.0], &BoxShape::new(2, 2), DEFAULT_DD_EPSILON);
    }

    #[test]
    fn halving_prefers_horizontal() {
        let s = BoxShape::new(4, 2);
        assert_eq!(s.halved(), Some(BoxShape::new(2, 2)));
        assert_eq!(BoxShape::new(3, 2).halved(), Some(BoxShape::new(3, 1)));
        assert_eq!(BoxShape::new(3, 3).halved(), None);
        assert_eq!(BoxShape::new3(1, 1, 4).halved(), Some(BoxShape::new3(1, 1, 2)));
    }

    #[test]
    fn stages_only_for_large_meshes() {
        let full = BoxShape::new(4, 4);
        assert_eq!(plan_stages(full, 100, 20_000), vec![full]);
        let staged = plan_stages(full, 50_000, 20_000);
        assert_eq!(
            staged,
            vec![
                BoxShape::new(1, 2),
                BoxShape::new(1, 4),
                BoxShape::new(2, 4),
                full
            ]
        );
    }

    #[test]
    fn embedding_uses_strides() {
        let full = BoxShape::new(4, 2);
        let coarse = BoxShape::new(2, 2);
        assert_eq!(coarse.embedded_rank([1, 1, 0], &full), 2 + 4);
        assert_eq!(full.embedded_rank([3, 1, 0], &full), 7);
    }

    #[test]
    fn display_shapes() {
        assert_eq!(BoxShape::new(2, 3).to_string(), "2x3");
        assert_eq!(BoxShape::new3(2, 3, 4).to_string(), "2x3x4");
    }
}
