//! Mesh data model of the distribution layer.
//!
//! This module provides:
//! - Typed arena handles for elements, nodes and vertices
//! - Element shape tags and their side tables
//! - Replication priorities and the element control word
//! - Per-level grids with O(1) handle-linked lists
//! - The arena-backed [`MultiGrid`](multigrid::MultiGrid)
//! - The process context shared by every collective step

pub mod cell_type;
pub mod context;
pub mod grid;
pub mod handle;
pub mod multigrid;
pub mod priority;

pub use cell_type::ElementTag;
pub use context::ProcessContext;
pub use handle::{ElementId, NodeId, VertexId};
pub use multigrid::{AuxVector, Element, MultiGrid, Node, Rank, Side, Vertex};
pub use priority::{ControlWord, ElementFlag, Priority, VectorOwnership};
