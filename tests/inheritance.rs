mod util;

use mesh_distrib::DebugInvariants;
use mesh_distrib::partitioning::{inherit_level, inherit_partition};
use mesh_distrib::replication::{LocalMiddleware, transfer_from_level};
use mesh_distrib::topology::{ElementId, ElementTag, MultiGrid, ProcessContext};

#[test]
fn fine_level_follows_coarse_destinations() {
    let (mut mg, coarse, fine) = util::two_level_square(2);
    assert!(mg.validate_invariants().is_ok());
    for (i, &e) in coarse.iter().enumerate() {
        mg.set_partition(e, i + 1).unwrap();
    }
    assert_eq!(inherit_level(&mut mg, 0).unwrap(), 16);
    for &f in &fine {
        let el = mg.element(f).unwrap();
        let father = mg.element(el.father().unwrap()).unwrap();
        assert_eq!(el.partition(), father.partition());
    }
    assert!(mg.check_inherited_partitions(0).is_ok());
}

#[test]
fn inheritance_overrides_stale_son_destinations() {
    let (mut mg, coarse, fine) = util::two_level_square(1);
    for &f in &fine {
        mg.set_partition(f, 9).unwrap();
    }
    assert!(mg.check_inherited_partitions(0).is_err());
    assert_eq!(inherit_partition(&mut mg, coarse[0]).unwrap(), 4);
    assert!(fine.iter().all(|&f| mg.element(f).unwrap().partition() == 0));
}

#[test]
#[should_panic(expected = "[invariants] stale sons")]
fn exported_invariant_macro_reports_stale_sons() {
    let (mut mg, _, fine) = util::two_level_square(1);
    for &f in &fine {
        mg.set_partition(f, 9).unwrap();
    }
    mesh_distrib::debug_invariants!(mg.check_inherited_partitions(0), "stale sons");
}

#[test]
fn three_levels_deep() {
    let mut mg = MultiGrid::new(3);
    mg.add_level();
    mg.add_level();
    let tet = |mg: &mut MultiGrid, level: usize, father: Option<ElementId>| {
        let corners: Vec<_> = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
            .into_iter()
            .map(|p| {
                let v = mg.add_vertex(p);
                mg.add_node(level, v, None).unwrap()
            })
            .collect();
        mg.add_element(level, ElementTag::Tetrahedron, &corners, father).unwrap()
    };
    let root = tet(&mut mg, 0, None);
    let sons: Vec<_> = (0..8).map(|_| tet(&mut mg, 1, Some(root))).collect();
    let mut grandsons = Vec::new();
    for &s in &sons {
        for _ in 0..8 {
            grandsons.push(tet(&mut mg, 2, Some(s)));
        }
    }
    mg.set_partition(root, 3).unwrap();
    assert_eq!(inherit_level(&mut mg, 0).unwrap(), 8 + 64);
    assert!(grandsons.iter().all(|&g| mg.element(g).unwrap().partition() == 3));
    // a leaf has nothing to push down
    assert_eq!(inherit_partition(&mut mg, grandsons[0]).unwrap(), 0);
}

#[test]
fn transfer_moves_whole_trees() {
    let (mut mg, coarse, fine) = util::two_level_square(2);
    let ctx = ProcessContext::new(0, 2, 0).unwrap();
    // right column of coarse elements leaves
    mg.set_partition(coarse[1], 1).unwrap();
    mg.set_partition(coarse[3], 1).unwrap();
    let mut mw = LocalMiddleware::new(0);
    transfer_from_level(&mut mg, &ctx, &mut mw, 0).unwrap();

    for &f in &fine {
        if let Ok(el) = mg.element(f) {
            // every surviving son still hangs below a surviving father
            let father = el.father().expect("surviving son keeps its father");
            assert!(mg.element(father).is_ok());
        }
    }
    assert_eq!(mg.grid(0).unwrap().element_count(), 4);
    // 8 owned fine elements plus the adjacent fine column as ghosts
    assert_eq!(mg.grid(1).unwrap().element_count(), 12);
}
