//! Single-character diagnostics and the active-rank report.
//!
//! | command | action                                   |
//! |---------|------------------------------------------|
//! | `c`     | middleware consistency check             |
//! | `s`     | process context and middleware status    |
//! | `i`     | declared communication interfaces        |
//! | `l`     | local objects with priority and holders  |

use crate::algs::collective::gather_flags;
use crate::algs::communicator::{CommTag, Communicator};
use crate::mesh_error::MeshDistribError;
use crate::replication::middleware::{ObjectRef, ReplicationMiddleware};
use crate::topology::context::ProcessContext;
use crate::topology::multigrid::MultiGrid;
use itertools::Itertools;
use std::fmt::Write as _;
use std::str::FromStr;

const ACTIVE_TAG: CommTag = CommTag::new(0x4500);

/// A diagnostics request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiagCommand {
    ConsistencyCheck,
    Status,
    Interfaces,
    ListObjects,
}

impl DiagCommand {
    /// Parse the first non-blank character of `line`.
    pub fn parse(line: &str) -> Result<Self, MeshDistribError> {
        match line.trim_start().chars().next() {
            Some('c') => Ok(DiagCommand::ConsistencyCheck),
            Some('s') => Ok(DiagCommand::Status),
            Some('i') => Ok(DiagCommand::Interfaces),
            Some('l') => Ok(DiagCommand::ListObjects),
            _ => Err(MeshDistribError::UnknownDiagnostic(line.trim().to_string())),
        }
    }
}

impl FromStr for DiagCommand {
    type Err = MeshDistribError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Outcome of [`run_diagnostic`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagReport {
    pub text: String,
    /// Violations found by a consistency check, zero otherwise.
    pub violations: usize,
}

/// Execute `cmd` on the local mesh and log the result.
pub fn run_diagnostic<M: ReplicationMiddleware>(
    cmd: DiagCommand,
    mg: &MultiGrid,
    ctx: &ProcessContext,
    mw: &M,
) -> DiagReport {
    let mut report = DiagReport::default();
    match cmd {
        DiagCommand::ConsistencyCheck => {
            report.violations = mw.consistency_check(mg);
            report.text = format!(
                "rank {}: consistency check found {} violation(s)",
                ctx.rank(),
                report.violations
            );
        }
        DiagCommand::Status => {
            report.text = format!(
                "rank {} of {} (coordinator {}): {} levels, {} elements, {} nodes\n{}",
                ctx.rank(),
                ctx.size(),
                ctx.coordinator(),
                mg.top_level() + 1,
                mg.element_count(),
                mg.node_count(),
                mw.status()
            );
        }
        DiagCommand::Interfaces => {
            let mut text = String::new();
            for (id, decl) in mw.interfaces().iter().enumerate() {
                let _ = writeln!(
                    text,
                    "{id}: {} kinds={:?} [{}] <-> [{}]",
                    decl.name,
                    decl.kinds,
                    decl.side_a.iter().join(","),
                    decl.side_b.iter().join(",")
                );
            }
            report.text = text;
        }
        DiagCommand::ListObjects => {
            let mut text = String::new();
            for e in mg.elements() {
                let Ok(el) = mg.element(e) else { continue };
                let object = ObjectRef::Element(e);
                let _ = writeln!(
                    text,
                    "{object} gid={:#x} level={} {:?} prio={} dest={} holders={}",
                    mw.global_id(object),
                    el.level(),
                    el.tag(),
                    el.priority(),
                    el.partition(),
                    format_ranks(&mw.holders(mg, object))
                );
            }
            for n in mg.nodes() {
                let Ok(node) = mg.node(n) else { continue };
                let _ = writeln!(
                    text,
                    "{n} level={} {} vector={}",
                    node.level(),
                    node.vertex(),
                    if node.vector().is_some() { "yes" } else { "no" }
                );
            }
            report.text = text;
        }
    }
    log::info!("diag {cmd:?}:\n{}", report.text);
    report
}

/// Compact rank list, for example `(0-3,7)`.
pub fn format_rank_set(active: &[bool]) -> String {
    let ranks: Vec<usize> = active
        .iter()
        .enumerate()
        .filter_map(|(r, &on)| on.then_some(r))
        .collect();
    format_ranks(&ranks)
}

/// Same as [`format_rank_set`] for a sorted rank list.
fn format_ranks(ranks: &[usize]) -> String {
    let runs = ranks
        .iter()
        .copied()
        .enumerate()
        .chunk_by(|&(i, r)| r - i)
        .into_iter()
        .map(|(_, run)| {
            let run: Vec<usize> = run.map(|(_, r)| r).collect();
            match run.as_slice() {
                [single] => single.to_string(),
                [first, .., last] => format!("{first}-{last}"),
                [] => String::new(),
            }
        })
        .join(",");
    format!("({runs})")
}

/// Gather the `active` flag of every rank on the coordinator and log the
/// active set there. Returns the formatted set on the coordinator.
///
/// Collective over `comm`.
pub fn report_active_ranks<C: Communicator>(
    comm: &C,
    ctx: &ProcessContext,
    active: bool,
) -> Result<Option<String>, MeshDistribError> {
    let flags = gather_flags(comm, ACTIVE_TAG, ctx.coordinator(), active)?;
    Ok(flags.map(|flags| {
        let set = format_rank_set(&flags);
        log::info!("active ranks {set}");
        set
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_runs() {
        let flags = [true, true, true, true, false, false, false, true];
        assert_eq!(format_rank_set(&flags), "(0-3,7)");
        assert_eq!(format_rank_set(&[false, true, false, true]), "(1,3)");
        assert_eq!(format_rank_set(&[false, false]), "()");
        assert_eq!(format_ranks(&[2, 3, 5, 6, 7]), "(2-3,5-7)");
    }

    #[test]
    fn parse_first_character() {
        assert_eq!(DiagCommand::parse(" c"), Ok(DiagCommand::ConsistencyCheck));
        assert_eq!("status".parse::<DiagCommand>(), Ok(DiagCommand::Status));
        assert_eq!(
            DiagCommand::parse("x"),
            Err(MeshDistribError::UnknownDiagnostic("x".into()))
        );
        assert!(DiagCommand::parse("").is_err());
    }
}
