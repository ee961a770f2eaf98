#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-distrib
//!
//! mesh-distrib is the parallel mesh-distribution layer of an adaptive
//! multigrid PDE solver. Every process holds a piece of an unstructured,
//! hierarchically refined mesh; this crate decides where each element
//! should live and drives a replication middleware to move it there.
//!
//! ## Pipeline
//! 1. A partitioner writes destination ranks: recursive coordinate
//!    bisection ([`partitioning::rcb`]) or a structured box decomposition of
//!    the unit domain ([`partitioning::structured`]).
//! 2. Destinations are pushed down the refinement tree
//!    ([`partitioning::inherit`]).
//! 3. The overlap planner ([`overlap::planner`]) issues Master and Ghost
//!    copy directives and decides which nodes keep their auxiliary data.
//! 4. The transfer session of the [`replication::ReplicationMiddleware`]
//!    commits the new distribution.
//!
//! [`balance::LoadBalancer`] ties the steps together behind a one-line
//! command surface, and [`diagnostics`] offers consistency and status dumps.
//!
//! ## Execution model
//! SPMD: every process runs the same calls on its own local mesh. The only
//! collective operations are one global maximum reduction (staged
//! structured decomposition) and the transfer session itself.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! mesh-distrib = "0.3"
//! # features = ["mpi-support"]
//! ```

pub mod algs;
pub mod balance;
pub mod debug_invariants;
pub mod diagnostics;
pub mod geometry;
pub mod mesh_error;
pub mod overlap;
pub mod partitioning;
pub mod replication;
pub mod topology;

pub use debug_invariants::DebugInvariants;

#[doc(hidden)]
pub use log;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::balance::{BalanceConfig, BalanceOutcome, LbCommand, LbStrategy, LoadBalancer};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::diagnostics::{DiagCommand, format_rank_set, report_active_ranks, run_diagnostic};
    pub use crate::mesh_error::MeshDistribError;
    pub use crate::overlap::plan_overlap;
    pub use crate::partitioning::{
        BoxShape, ProcGrid, balance_level_rcb, create_dd, inherit_level, structured_decomposition,
    };
    pub use crate::replication::{
        LocalMiddleware, ObjectRef, ReplicationMiddleware, TransferReport, transfer_from_level,
    };
    pub use crate::topology::{
        ElementId, ElementTag, MultiGrid, NodeId, Priority, ProcessContext, Rank, VertexId,
    };
}
