//! Push coarse destinations down the refinement tree.
//!
//! Only coarse elements are balanced explicitly; every descendant must
//! travel with its ancestor so that a refinement hierarchy is never split
//! across processes.

use crate::mesh_error::MeshDistribError;
use crate::topology::handle::ElementId;
use crate::topology::multigrid::MultiGrid;

/// Copy the destination of `e` to all of its descendants.
///
/// Returns the number of descendants updated.
pub fn inherit_partition(mg: &mut MultiGrid, e: ElementId) -> Result<usize, MeshDistribError> {
    let el = mg.element(e)?;
    let dest = el.partition();
    let sons = el.sons().to_vec();
    let mut updated = 0;
    for son in sons {
        mg.set_partition(son, dest)?;
        updated += 1 + inherit_partition(mg, son)?;
    }
    Ok(updated)
}

/// Run [`inherit_partition`] for every element of `level`.
pub fn inherit_level(mg: &mut MultiGrid, level: usize) -> Result<usize, MeshDistribError> {
    let elements: Vec<ElementId> = mg.elements_on(level)?.collect();
    let mut updated = 0;
    for e in elements {
        updated += inherit_partition(mg, e)?;
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::cell_type::ElementTag;

    fn tri(mg: &mut MultiGrid, level: usize, father: Option<ElementId>) -> ElementId {
        let corners: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
            .iter()
            .map(|&[x, y]| {
                let v = mg.add_vertex([x, y, 0.0]);
                mg.add_node(level, v, None).unwrap()
            })
            .collect();
        mg.add_element(level, ElementTag::Triangle, &corners, father)
            .unwrap()
    }

    #[test]
    fn three_level_tree_follows_root() {
        let mut mg = MultiGrid::new(2);
        mg.add_level();
        mg.add_level();
        let root = tri(&mut mg, 0, None);
        let sons: Vec<_> = (0..4).map(|_| tri(&mut mg, 1, Some(root))).collect();
        let grandsons: Vec<_> = (0..2).map(|_| tri(&mut mg, 2, Some(sons[1]))).collect();
        mg.set_partition(root, 5).unwrap();
        mg.set_partition(sons[2], 1).unwrap();
        mg.set_partition(grandsons[0], 2).unwrap();

        assert_eq!(inherit_level(&mut mg, 0).unwrap(), 6);
        for e in sons.iter().chain(&grandsons) {
            assert_eq!(mg.element(*e).unwrap().partition(), 5);
        }
    }

    #[test]
    fn leaf_is_untouched() {
        let mut mg = MultiGrid::new(2);
        let e = tri(&mut mg, 0, None);
        mg.set_partition(e, 3).unwrap();
        assert_eq!(inherit_partition(&mut mg, e).unwrap(), 0);
        assert_eq!(mg.element(e).unwrap().partition(), 3);
    }
}
