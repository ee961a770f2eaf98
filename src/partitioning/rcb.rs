//! Recursive coordinate bisection over a 2-D process grid.
//!
//! The process grid is a `width × height` array of ranks; cell `(col, row)`
//! is rank `row * width + col`. [`rcb_assign`] splits a sub-rectangle of the
//! grid at its midpoint along the longer extent and splits the centroid
//! list, sorted along the same axis, proportionally to the two halves.
//!
//! The split axis is always chosen from the two process-grid extents, so a
//! third spatial axis only ever acts as a tie-breaking sort key.

use crate::geometry::centroid;
use crate::mesh_error::MeshDistribError;
use crate::topology::handle::ElementId;
use crate::topology::multigrid::{MultiGrid, Rank};

/// Coordinates closer than this compare equal in the RCB sort.
pub const DEFAULT_RCB_TOLERANCE: f64 = 1e-5;

/// Element handle plus its center; lives for one RCB call only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CentroidRecord {
    pub element: ElementId,
    pub center: [f64; 3],
    pub dest: Rank,
}

/// Shape of the process grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProcGrid {
    pub width: usize,
    pub height: usize,
}

impl ProcGrid {
    /// The most nearly square `width × height == procs` with `width >= height`.
    pub fn for_procs(procs: usize) -> Self {
        let procs = procs.max(1);
        let mut height = (procs as f64).sqrt() as usize;
        while height > 1 && procs % height != 0 {
            height -= 1;
        }
        let height = height.max(1);
        Self {
            width: procs / height,
            height,
        }
    }

    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    /// The whole grid as a rectangle.
    pub fn full_rect(&self) -> ProcRect {
        ProcRect {
            px: 0,
            py: 0,
            dx: self.width,
            dy: self.height,
        }
    }
}

/// Sub-rectangle of the process grid: origin `(px, py)`, extent `(dx, dy)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcRect {
    pub px: usize,
    pub py: usize,
    pub dx: usize,
    pub dy: usize,
}

/// Fixed parameters of one RCB run.
#[derive(Clone, Copy, Debug)]
pub struct RcbParams {
    /// Width of the full process grid (row stride of destinations).
    pub grid_width: usize,
    /// Number of spatial axes the starting axis rotates through.
    pub dim: usize,
    /// Sort tolerance, see [`DEFAULT_RCB_TOLERANCE`].
    pub tolerance: f64,
}

/// Composite sort key: the primary axis, then the other axes in ascending
/// order, each snapped to the tolerance grid.
fn sort_key(center: &[f64; 3], axis: usize, tolerance: f64) -> [i64; 3] {
    let snap = |x: f64| (x / tolerance).round() as i64;
    let mut key = [snap(center[axis]), 0, 0];
    let mut k = 1;
    for (a, &x) in center.iter().enumerate() {
        if a != axis {
            key[k] = snap(x);
            k += 1;
        }
    }
    key
}

/// Assign every item a destination inside `rect`.
///
/// `axis` is the starting sort axis of this call; children receive
/// `(axis + 1) % dim`. Items with equal keys keep their input order, so the
/// result depends only on input order and tolerance.
pub fn rcb_assign(items: &mut [CentroidRecord], rect: ProcRect, axis: usize, params: &RcbParams) {
    if rect.dx <= 1 && rect.dy <= 1 {
        let dest = rect.py * params.grid_width + rect.px;
        for it in items.iter_mut() {
            it.dest = dest;
        }
        return;
    }

    let split_x = rect.dx >= rect.dy;
    let sort_axis = if split_x { 0 } else { 1 };
    log::trace!(
        "rcb: {} items in {:?}, start axis {axis}, split axis {sort_axis}",
        items.len(),
        rect
    );
    items.sort_by_cached_key(|it| sort_key(&it.center, sort_axis, params.tolerance));

    let (first, second, total, sub) = if split_x {
        let half = rect.dx / 2;
        (
            ProcRect { dx: half, ..rect },
            ProcRect {
                px: rect.px + half,
                dx: rect.dx - half,
                ..rect
            },
            rect.dx,
            half,
        )
    } else {
        let half = rect.dy / 2;
        (
            ProcRect { dy: half, ..rect },
            ProcRect {
                py: rect.py + half,
                dy: rect.dy - half,
                ..rect
            },
            rect.dy,
            half,
        )
    };

    let n = items.len();
    let m = (n * sub + total / 2) / total;
    let next = (axis + 1) % params.dim.max(1);
    let (lo, hi) = items.split_at_mut(m);
    rcb_assign(lo, first, next, params);
    rcb_assign(hi, second, next, params);
}

/// Reserve an empty scratch list for `len` centroid records.
pub fn reserve_centroids(len: usize) -> Result<Vec<CentroidRecord>, MeshDistribError> {
    let mut items = Vec::new();
    if items.try_reserve_exact(len).is_err() {
        log::error!("rcb: out of memory for {len} centroid records, mesh left unchanged");
        return Err(MeshDistribError::ScratchAllocation(len));
    }
    Ok(items)
}

/// Build the transient centroid list for `elements`.
///
/// The scratch list is reserved up front; when that fails the error is
/// reported and nothing is assigned.
pub fn collect_centroids(
    mg: &MultiGrid,
    elements: &[ElementId],
) -> Result<Vec<CentroidRecord>, MeshDistribError> {
    let mut items = reserve_centroids(elements.len())?;
    for &e in elements {
        items.push(CentroidRecord {
            element: e,
            center: centroid(mg, e)?,
            dest: 0,
        });
    }
    Ok(items)
}

/// Run RCB over the Master elements of `level` and write their destinations.
///
/// Returns the number of elements assigned.
pub fn balance_level_rcb(
    mg: &mut MultiGrid,
    level: usize,
    grid: ProcGrid,
    tolerance: f64,
) -> Result<usize, MeshDistribError> {
    let elements = mg.masters_on(level)?;
    let mut items = collect_centroids(mg, &elements)?;
    let params = RcbParams {
        grid_width: grid.width,
        dim: mg.dim(),
        tolerance,
    };
    rcb_assign(&mut items, grid.full_rect(), 0, &params);
    for it in &items {
        mg.set_partition(it.element, it.dest)?;
    }
    log::debug!(
        "rcb: level {level}, {} elements over {}x{} processes",
        items.len(),
        grid.width,
        grid.height
    );
    Ok(items.len())
}
