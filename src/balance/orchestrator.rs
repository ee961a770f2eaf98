//! Dispatch of load-balancing commands.
//!
//! Every strategy starts from "everything stays where it is" (all
//! destinations set to the local rank), writes the destinations it wants
//! and, except for agglomeration, ends with a transfer from the level it
//! balanced. All ranks must execute the same command.

use super::command::{LbCommand, LbStrategy};
use super::config::BalanceConfig;
use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshDistribError;
use crate::partitioning::rcb::{ProcGrid, balance_level_rcb};
use crate::partitioning::structured::{BoxShape, create_dd};
use crate::replication::middleware::{ObjectRef, ReplicationMiddleware, TransferReport};
use crate::replication::transfer::{register_object_types, transfer_from_level};
use crate::topology::context::ProcessContext;
use crate::topology::handle::{ElementId, NodeId};
use crate::topology::multigrid::{MultiGrid, Rank};
use crate::topology::priority::Priority;

/// Result of one balancing call on this rank.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BalanceOutcome {
    pub command: LbCommand,
    /// Destinations written by this rank.
    pub assigned: usize,
    /// Box shapes used by a structured decomposition, coarsest first.
    pub stages: Vec<BoxShape>,
    /// Reports of the transfer sessions run by the call, in order.
    pub reports: Vec<TransferReport>,
}

impl BalanceOutcome {
    fn new(command: LbCommand) -> Self {
        Self {
            command,
            assigned: 0,
            stages: Vec::new(),
            reports: Vec::new(),
        }
    }
}

/// Load-balancing driver for one process.
#[derive(Debug)]
pub struct LoadBalancer<C, M> {
    config: BalanceConfig,
    ctx: ProcessContext,
    comm: C,
    mw: M,
}

impl<C, M> LoadBalancer<C, M>
where
    C: Communicator,
    M: ReplicationMiddleware,
{
    /// Build the driver and register the object kinds with `mw`.
    pub fn new(config: BalanceConfig, comm: C, mut mw: M) -> Result<Self, MeshDistribError> {
        let ctx = ProcessContext::from_comm(&comm, config.coordinator)?;
        register_object_types(&mut mw);
        Ok(Self {
            config,
            ctx,
            comm,
            mw,
        })
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn middleware(&self) -> &M {
        &self.mw
    }

    pub fn middleware_mut(&mut self) -> &mut M {
        &mut self.mw
    }

    pub fn into_parts(self) -> (C, M) {
        (self.comm, self.mw)
    }

    /// Parse, validate and execute one command line.
    pub fn run_line(
        &mut self,
        mg: &mut MultiGrid,
        line: &str,
    ) -> Result<BalanceOutcome, MeshDistribError> {
        let cmd = LbCommand::parse(line)?;
        self.run(mg, cmd)
    }

    /// Validate and execute `cmd`.
    ///
    /// Verbose transfer statistics are switched on for the call when the
    /// command or the configuration asks for them, and the previous setting
    /// is restored afterwards, also on error.
    pub fn run(
        &mut self,
        mg: &mut MultiGrid,
        cmd: LbCommand,
    ) -> Result<BalanceOutcome, MeshDistribError> {
        cmd.validate(&self.ctx, mg.top_level())?;
        log::info!("lb: rank {} runs `{cmd}`", self.ctx.rank());
        let verbose = cmd.verbose || self.config.verbose_transfers;
        let previous = self.mw.set_transfer_stats(verbose);
        let result = self.dispatch(mg, cmd);
        self.mw.set_transfer_stats(previous);
        result
    }

    fn dispatch(
        &mut self,
        mg: &mut MultiGrid,
        cmd: LbCommand,
    ) -> Result<BalanceOutcome, MeshDistribError> {
        let mut out = BalanceOutcome::new(cmd);
        match cmd.strategy {
            LbStrategy::Rcb { level } => {
                out.assigned = self.rcb_level(mg, level)?;
                out.reports.push(self.transfer(mg, level)?);
            }
            LbStrategy::RcbRange { from, to } => {
                for level in from..=to {
                    out.assigned += self.rcb_level(mg, level)?;
                    out.reports.push(self.transfer(mg, level)?);
                }
            }
            LbStrategy::CollectToMaster { from, to } => {
                let to = to.unwrap_or(mg.top_level());
                out.assigned = self.collect_to_master(mg, from, to)?;
                out.reports.push(self.transfer(mg, from)?);
            }
            LbStrategy::SegmentCollect { part, dest, level } => {
                out.assigned = self.segment_collect(mg, part, dest, level)?;
                out.reports.push(self.transfer(mg, level)?);
            }
            LbStrategy::FullAssign { dest } => {
                let dest = dest.unwrap_or(self.ctx.coordinator());
                out.assigned = self.full_assign(mg, dest)?;
                out.reports.push(self.transfer(mg, 0)?);
            }
            LbStrategy::Structured(shape) => {
                out.stages = create_dd(
                    mg,
                    0,
                    &shape,
                    &self.ctx,
                    &self.comm,
                    &mut self.mw,
                    self.config.dd_threshold,
                    self.config.dd_epsilon,
                )?;
                out.assigned = mg.masters_on(0)?.len();
                out.reports.push(self.transfer(mg, 0)?);
            }
            LbStrategy::Agglomerate => {
                let (scheduled, report) = self.agglomerate(mg)?;
                out.assigned = scheduled;
                out.reports.push(report);
            }
        }
        Ok(out)
    }

    fn transfer(
        &mut self,
        mg: &mut MultiGrid,
        level: usize,
    ) -> Result<TransferReport, MeshDistribError> {
        transfer_from_level(mg, &self.ctx, &mut self.mw, level)
    }

    /// RCB runs on the coordinator only; the other ranks keep their elements.
    fn rcb_level(&mut self, mg: &mut MultiGrid, level: usize) -> Result<usize, MeshDistribError> {
        if !self.ctx.is_coordinator() {
            mg.reset_partitions(self.ctx.rank());
            return Ok(0);
        }
        let grid = ProcGrid::for_procs(self.ctx.size());
        log::debug!(
            "lb: rcb on level {level} over a {}x{} process grid",
            grid.width,
            grid.height
        );
        balance_level_rcb(mg, level, grid, self.config.rcb_tolerance)
    }

    fn collect_to_master(
        &mut self,
        mg: &mut MultiGrid,
        from: usize,
        to: usize,
    ) -> Result<usize, MeshDistribError> {
        mg.reset_partitions(self.ctx.rank());
        if self.ctx.is_coordinator() {
            return Ok(0);
        }
        let coordinator = self.ctx.coordinator();
        let mut assigned = 0;
        for level in from..=to {
            for e in mg.masters_on(level)? {
                mg.set_partition(e, coordinator)?;
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    fn segment_collect(
        &mut self,
        mg: &mut MultiGrid,
        part: u32,
        dest: Rank,
        level: usize,
    ) -> Result<usize, MeshDistribError> {
        mg.reset_partitions(self.ctx.rank());
        let touching: Vec<ElementId> = mg
            .masters_on(level)?
            .into_iter()
            .filter(|&e| {
                mg.element(e).is_ok_and(|el| {
                    el.is_boundary() && el.sides().iter().any(|s| s.boundary_part == Some(part))
                })
            })
            .collect();
        for &e in &touching {
            mg.set_partition(e, dest)?;
        }
        log::debug!(
            "lb: {} elements on level {level} touch part {part}, sent to rank {dest}",
            touching.len()
        );
        Ok(touching.len())
    }

    fn full_assign(&mut self, mg: &mut MultiGrid, dest: Rank) -> Result<usize, MeshDistribError> {
        mg.reset_partitions(self.ctx.rank());
        if !self.ctx.is_coordinator() {
            return Ok(0);
        }
        let elements = mg.masters_on(0)?;
        for &e in &elements {
            mg.set_partition(e, dest)?;
        }
        Ok(elements.len())
    }

    /// Move the auxiliary data of the coarsest level to the coordinator.
    ///
    /// Each non-coordinator rank hands its level-0 vectors to the
    /// coordinator as Master and keeps a VGhost copy itself.
    fn agglomerate(
        &mut self,
        mg: &mut MultiGrid,
    ) -> Result<(usize, TransferReport), MeshDistribError> {
        let me = self.ctx.rank();
        let coordinator = self.ctx.coordinator();
        let vectors: Vec<NodeId> = if self.ctx.is_coordinator() {
            Vec::new()
        } else {
            mg.nodes_on(0)?
                .filter(|&n| mg.node(n).is_ok_and(|node| node.vector().is_some()))
                .collect()
        };

        self.mw.begin_session()?;
        for &n in &vectors {
            let scheduled = self
                .mw
                .copy(ObjectRef::Vector(n), coordinator, Priority::Master)
                .and_then(|()| self.mw.copy(ObjectRef::Vector(n), me, Priority::VGhost));
            if let Err(e) = scheduled {
                let _ = self.mw.end_session(mg);
                return Err(e);
            }
        }
        let report = self.mw.end_session(mg)?;
        log::debug!(
            "lb: rank {me} handed {} vectors to rank {coordinator}",
            vectors.len()
        );
        Ok((vectors.len(), report))
    }
}
