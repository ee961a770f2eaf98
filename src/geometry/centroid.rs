//! Element centers and bounding corners.

use crate::mesh_error::MeshDistribError;
use crate::topology::handle::ElementId;
use crate::topology::multigrid::MultiGrid;

/// Coordinate-wise arithmetic mean of `points`; the origin for an empty slice.
pub fn mean_point(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let mut c = [0.0; 3];
    for p in points {
        for (acc, x) in c.iter_mut().zip(p) {
            *acc += x;
        }
    }
    let n = points.len() as f64;
    c.map(|x| x / n)
}

/// Centroid of element `e`: the mean of its corner coordinates.
///
/// Fails only if `e` or one of its corners is not a live record.
pub fn centroid(mg: &MultiGrid, e: ElementId) -> Result<[f64; 3], MeshDistribError> {
    let corners = corner_coords(mg, e)?;
    Ok(mean_point(&corners))
}

/// Coordinate-wise maximum over the corners of `e`.
pub fn max_corner(mg: &MultiGrid, e: ElementId) -> Result<[f64; 3], MeshDistribError> {
    let corners = corner_coords(mg, e)?;
    let mut m = [f64::NEG_INFINITY; 3];
    for p in &corners {
        for (acc, &x) in m.iter_mut().zip(p) {
            *acc = acc.max(x);
        }
    }
    Ok(m)
}

fn corner_coords(mg: &MultiGrid, e: ElementId) -> Result<Vec<[f64; 3]>, MeshDistribError> {
    mg.element(e)?
        .corners()
        .iter()
        .map(|&n| mg.node_coords(n))
        .collect()
}
