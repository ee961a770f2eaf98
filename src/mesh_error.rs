//! MeshDistribError: unified error type for mesh-distrib public APIs
//!
//! Builders, parsers and the orchestrator return this error. Contract
//! violations inside the partitioners (grid-shape product, coordinates
//! outside the unit domain) are assertions and never surface here.

use crate::topology::handle::{ElementId, NodeId, VertexId};
use crate::topology::cell_type::ElementTag;
use thiserror::Error;

/// Unified error type for mesh-distrib operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshDistribError {
    /// Handle does not refer to a live element.
    #[error("element handle {0} is not live")]
    InvalidElement(ElementId),
    /// Handle does not refer to a live node.
    #[error("node handle {0} is not live")]
    InvalidNode(NodeId),
    /// Handle does not refer to a vertex.
    #[error("vertex handle {0} is out of range")]
    InvalidVertex(VertexId),
    /// Wrong number of corners for the given element tag.
    #[error("{tag:?} expects {expected} corners, got {found}")]
    CornerCount {
        tag: ElementTag,
        expected: usize,
        found: usize,
    },
    /// Side index beyond the element's side count.
    #[error("element {element} has no side {side}")]
    InvalidSide { element: ElementId, side: usize },
    /// Level index beyond the multigrid's top level.
    #[error("level {level} out of range (top level is {top})")]
    LevelOutOfRange { level: usize, top: usize },
    /// A son must live exactly one level below its father.
    #[error("father {father} is on level {father_level}, son requested on level {level}")]
    FatherLevelMismatch {
        father: ElementId,
        father_level: usize,
        level: usize,
    },
    /// A corner node belongs to another level than its element.
    #[error("node {node} lives on level {node_level}, element requested on level {level}")]
    NodeLevelMismatch {
        node: NodeId,
        node_level: usize,
        level: usize,
    },
    /// Element tag dimension differs from the multigrid dimension.
    #[error("{tag:?} is a {tag_dim}-D element but the multigrid is {dim}-D")]
    DimensionMismatch {
        tag: ElementTag,
        tag_dim: usize,
        dim: usize,
    },
    /// Empty load-balancing command line.
    /// `element` points at `neighbor`, which does not point back.
    #[error("element {element} sees {neighbor} as neighbor but not vice versa")]
    AsymmetricNeighbor {
        element: ElementId,
        neighbor: ElementId,
    },
    /// A son's destination differs from its father's.
    #[error("son {son} is destined for rank {son_rank}, its father for rank {father_rank}")]
    PartitionNotInherited {
        son: ElementId,
        son_rank: usize,
        father_rank: usize,
    },
    #[error("empty load-balancing command")]
    EmptyCommand,
    /// Unknown load-balancing mode code.
    #[error("unknown load-balancing mode {0}")]
    UnknownMode(i64),
    /// A command parameter is missing.
    #[error("mode {mode} requires parameter `{name}`")]
    MissingParameter { mode: u32, name: &'static str },
    /// A command token is not an integer.
    #[error("invalid integer `{0}` in command")]
    InvalidParameter(String),
    /// Unknown diagnostics command character.
    #[error("unknown diagnostics command `{0}`")]
    UnknownDiagnostic(String),
    /// Process grid product does not match the number of processes.
    #[error("process grid {shape} has {product} cells but {size} processes are running")]
    GridShapeMismatch {
        shape: String,
        product: usize,
        size: usize,
    },
    /// A rank parameter is not a valid process rank.
    #[error("rank {rank} out of range for {size} processes")]
    RankOutOfRange { rank: usize, size: usize },
    /// Level range with `from > to`.
    #[error("empty level range {from}..={to}")]
    EmptyLevelRange { from: usize, to: usize },
    /// Scratch buffer for the centroid list could not be allocated.
    #[error("could not allocate scratch space for {0} centroids")]
    ScratchAllocation(usize),
    /// Communication failure with a peer rank.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// Middleware session used out of order.
    #[error("transfer session misuse: {0}")]
    SessionState(&'static str),
}
