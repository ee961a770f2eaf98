mod util;

use mesh_distrib::DebugInvariants;
use mesh_distrib::overlap::plan_overlap;
use mesh_distrib::replication::{
    Directive, LocalMiddleware, ObjectRef, ReplicationMiddleware, transfer_from_level,
};
use mesh_distrib::topology::{ElementId, MultiGrid, Priority, ProcessContext, Rank, VectorOwnership};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn scatter(mg: &mut MultiGrid, elems: &[ElementId], procs: usize, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    for &e in elems {
        mg.set_partition(e, rng.gen_range(0..procs)).unwrap();
    }
}

fn copies(plan: &[Directive], e: ElementId, rank: Rank, priority: Priority) -> usize {
    plan.iter()
        .filter(|d| {
            matches!(d, Directive::Copy { object, dest, priority: p, .. }
                if *object == ObjectRef::Element(e) && *dest == rank && *p == priority)
        })
        .count()
}

fn check_plan(mg: &MultiGrid, elems: &[ElementId], ctx: &ProcessContext, plan: &[Directive]) {
    let me = ctx.rank();
    for &e in elems {
        let el = mg.element(e).unwrap();
        let dest = el.partition();
        assert_eq!(copies(plan, e, dest, Priority::Master), 1, "{e} master");
        for r in 0..ctx.size() {
            assert!(copies(plan, e, r, Priority::Ghost) <= 1, "{e} ghost on {r}");
        }
        if dest == me {
            for &c in el.corners() {
                assert_eq!(mg.node(c).unwrap().ownership(), VectorOwnership::Keep);
            }
            continue;
        }
        let local_neighbor = el
            .neighbors()
            .any(|nb| mg.element(nb).unwrap().partition() == me);
        let expected = usize::from(local_neighbor);
        assert_eq!(copies(plan, e, me, Priority::Ghost), expected, "{e} local ghost");
        let deleted = plan.contains(&Directive::Delete {
            object: ObjectRef::Element(e),
        });
        assert_eq!(deleted, !local_neighbor, "{e} delete");
    }
}

#[test]
fn four_rank_checkerboard_from_rank_zero() {
    let (mut mg, elems) = util::unit_square(4, true);
    // 2x2 blocks, one per rank
    for row in 0..4 {
        for col in 0..4 {
            mg.set_partition(elems[row * 4 + col], (row / 2) * 2 + col / 2).unwrap();
        }
    }
    let ctx = ProcessContext::new(0, 4, 0).unwrap();
    let mut mw = LocalMiddleware::new(0);
    mw.begin_session().unwrap();
    let summary = plan_overlap(&mut mg, &ctx, &mut mw, 0).unwrap();
    check_plan(&mg, &elems, &ctx, mw.pending().unwrap());
    assert_eq!(summary.local_masters, 4);
    // the two side strips next to the owned block; the diagonal element
    // only touches rank 0 by a corner
    assert_eq!(summary.local_ghosts, 4);
    assert_eq!(summary.deleted, 8);
    // 3x3 nodes of the owned block keep their data
    assert_eq!(summary.kept_nodes, 9);
    assert_eq!(summary.dropped_vectors, 25 - 9);
    // owned block plus the ghost strips touch 3x3 + 3 + 3 nodes
    assert_eq!(summary.dropped_nodes, 25 - 15);
    mw.end_session(&mut mg).unwrap();
    assert_eq!(mw.consistency_check(&mg), 0);
    assert_eq!(mg.element_count(), 8);
    assert_eq!(mg.node_count(), 15);
    assert!(mg.validate_invariants().is_ok());
}

#[test]
fn nothing_moves_when_everything_stays() {
    let (mut mg, elems) = util::unit_square(3, true);
    let ctx = ProcessContext::new(1, 2, 0).unwrap();
    mg.reset_partitions(1);
    let mut mw = LocalMiddleware::new(1);
    let report = transfer_from_level(&mut mg, &ctx, &mut mw, 0).unwrap();
    assert_eq!(report.master_copies, elems.len());
    assert_eq!(report.ghost_copies, 0);
    assert_eq!(report.deletes, 0);
    assert_eq!(report.sent_off_rank, 0);
    assert_eq!(mg.element_count(), elems.len());
}

proptest! {
    #[test]
    fn planner_guarantees_hold_for_random_destinations(
        n in 1usize..7,
        procs in 1usize..5,
        seed in any::<u64>(),
    ) {
        let (mut mg, elems) = util::unit_square(n, true);
        scatter(&mut mg, &elems, procs, seed);
        let ctx = ProcessContext::new(0, procs, 0).unwrap();
        let mut mw = LocalMiddleware::new(0);
        mw.begin_session().unwrap();
        plan_overlap(&mut mg, &ctx, &mut mw, 0).unwrap();
        check_plan(&mg, &elems, &ctx, mw.pending().unwrap());
        mw.end_session(&mut mg).unwrap();
        prop_assert_eq!(mw.consistency_check(&mg), 0);
        prop_assert!(mg.validate_invariants().is_ok());
    }
}
