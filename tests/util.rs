#![allow(dead_code)]
use mesh_distrib::topology::{AuxVector, ElementId, ElementTag, MultiGrid, NodeId};

/// `n × n` side-connected unit quads covering the unit square on level 0.
///
/// Elements are created row by row, so element `(col, row)` is
/// `elems[row * n + col]`.
pub fn unit_square(n: usize, with_vectors: bool) -> (MultiGrid, Vec<ElementId>) {
    let mut mg = MultiGrid::new(2);
    let elems = add_quad_layer(&mut mg, 0, n, with_vectors, |_| None);
    mg.connect_sides(0).unwrap();
    (mg, elems)
}

/// Add an `n × n` quad layer on `level`; `father(i)` gives the father of
/// the `i`-th element.
pub fn add_quad_layer(
    mg: &mut MultiGrid,
    level: usize,
    n: usize,
    with_vectors: bool,
    father: impl Fn(usize) -> Option<ElementId>,
) -> Vec<ElementId> {
    let h = 1.0 / n as f64;
    let vector = with_vectors.then_some(AuxVector { components: 1 });
    let mut nodes: Vec<NodeId> = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            let v = mg.add_vertex([i as f64 * h, j as f64 * h, 0.0]);
            nodes.push(mg.add_node(level, v, vector).unwrap());
        }
    }
    let mut elems = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let a = j * (n + 1) + i;
            let corners = [nodes[a], nodes[a + 1], nodes[a + n + 2], nodes[a + n + 1]];
            let e = mg
                .add_element(level, ElementTag::Quadrilateral, &corners, father(j * n + i))
                .unwrap();
            elems.push(e);
        }
    }
    elems
}

/// Refine every level-0 element of `unit_square(n)` into the matching
/// 2×2 block of a `2n × 2n` layer on level 1.
pub fn two_level_square(n: usize) -> (MultiGrid, Vec<ElementId>, Vec<ElementId>) {
    let (mut mg, coarse) = unit_square(n, false);
    mg.add_level();
    let fine_n = 2 * n;
    let fine = add_quad_layer(&mut mg, 1, fine_n, false, |i| {
        let (col, row) = (i % fine_n, i / fine_n);
        Some(coarse[(row / 2) * n + col / 2])
    });
    mg.connect_sides(1).unwrap();
    (mg, coarse, fine)
}
