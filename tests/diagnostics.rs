mod util;

use mesh_distrib::algs::communicator::{NoComm, ThreadComm};
use mesh_distrib::balance::{BalanceConfig, LoadBalancer};
use mesh_distrib::diagnostics::{DiagCommand, report_active_ranks, run_diagnostic};
use mesh_distrib::replication::LocalMiddleware;
use mesh_distrib::topology::{Priority, ProcessContext};
use serial_test::serial;

#[test]
fn status_and_interfaces() {
    let (mg, _) = util::unit_square(2, false);
    let lb = LoadBalancer::new(BalanceConfig::default(), NoComm, LocalMiddleware::new(0)).unwrap();

    let status = run_diagnostic(DiagCommand::Status, &mg, lb.context(), lb.middleware());
    assert!(status.text.starts_with("rank 0 of 1 (coordinator 0): 1 levels, 4 elements, 9 nodes"));
    assert_eq!(status.violations, 0);

    let ifs = run_diagnostic(DiagCommand::Interfaces, &mg, lb.context(), lb.middleware());
    assert_eq!(ifs.text.lines().count(), 4);
    assert!(ifs.text.lines().next().unwrap().starts_with("0: ElementIF"));
}

#[test]
fn listing_covers_elements_and_nodes() {
    let (mg, _) = util::unit_square(3, true);
    let ctx = ProcessContext::serial();
    let mw = LocalMiddleware::new(0);
    let report = run_diagnostic(DiagCommand::ListObjects, &mg, &ctx, &mw);
    assert_eq!(report.text.lines().count(), 9 + 16);
    assert!(report.text.contains("holders=(0)"));
}

#[test]
fn consistency_check_counts_orphan_ghosts() {
    let (mut mg, elems) = util::unit_square(1, false);
    let ctx = ProcessContext::serial();
    let mw = LocalMiddleware::new(0);
    let clean = run_diagnostic("c".parse().unwrap(), &mg, &ctx, &mw);
    assert_eq!(clean.violations, 0);

    mg.apply_priority(elems[0], Priority::Ghost).unwrap();
    let report = run_diagnostic(DiagCommand::ConsistencyCheck, &mg, &ctx, &mw);
    assert_eq!(report.violations, 1);
    assert!(report.text.contains("1 violation"));
}

#[test]
#[serial]
fn coordinator_reports_even_ranks() {
    let handles: Vec<_> = (0..4)
        .map(|rank| {
            std::thread::spawn(move || {
                let comm = ThreadComm::new(rank, 4);
                let ctx = ProcessContext::from_comm(&comm, 0).unwrap();
                report_active_ranks(&comm, &ctx, rank % 2 == 0).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0].as_deref(), Some("(0,2)"));
    assert!(results[1..].iter().all(Option::is_none));
}
