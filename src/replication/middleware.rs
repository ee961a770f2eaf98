//! Interface of the replication middleware consumed by this crate.
//!
//! The middleware owns object registration, global ids, priorities and the
//! transport. This layer only opens a transfer session, issues copy and
//! delete directives, and commits. Every process must issue matching
//! `begin_session`/`end_session` calls; the order of directives inside a
//! session is free, the middleware reconciles them globally.

use crate::mesh_error::MeshDistribError;
use crate::topology::handle::{ElementId, NodeId, VertexId};
use crate::topology::multigrid::{MultiGrid, Rank};
use crate::topology::priority::Priority;
use std::fmt;
use std::time::Duration;

/// Kinds of distributed objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ObjectKind {
    Element,
    Node,
    Vertex,
    /// Auxiliary degree-of-freedom data of a node.
    Vector,
}

/// Reference to one local object.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum ObjectRef {
    Element(ElementId),
    Node(NodeId),
    Vertex(VertexId),
    /// The auxiliary data attached to a node.
    Vector(NodeId),
}

impl ObjectRef {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectRef::Element(_) => ObjectKind::Element,
            ObjectRef::Node(_) => ObjectKind::Node,
            ObjectRef::Vertex(_) => ObjectKind::Vertex,
            ObjectRef::Vector(_) => ObjectKind::Vector,
        }
    }

    fn raw(&self) -> u32 {
        match self {
            ObjectRef::Element(e) => e.get(),
            ObjectRef::Node(n) | ObjectRef::Vector(n) => n.get(),
            ObjectRef::Vertex(v) => v.get(),
        }
    }

    /// Rank-qualified global id: `rank:24 | kind:8 | handle:32`.
    pub fn global_id(&self, rank: Rank) -> GlobalId {
        ((rank as u64) << 40) | ((self.kind() as u64) << 32) | u64::from(self.raw())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Element(e) => write!(f, "{e}"),
            ObjectRef::Node(n) => write!(f, "{n}"),
            ObjectRef::Vertex(v) => write!(f, "{v}"),
            ObjectRef::Vector(n) => write!(f, "vec({n})"),
        }
    }
}

/// Global object identifier.
pub type GlobalId = u64;

/// One request inside a transfer session.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Directive {
    /// Create or re-prioritise a copy of `object` on `dest`.
    Copy {
        object: ObjectRef,
        dest: Rank,
        priority: Priority,
        /// Explicit payload size in bytes; the registered type size otherwise.
        size: Option<usize>,
    },
    /// Drop the local copy of `object`.
    Delete { object: ObjectRef },
}

impl Directive {
    pub fn object(&self) -> ObjectRef {
        match self {
            Directive::Copy { object, .. } | Directive::Delete { object } => *object,
        }
    }
}

/// Communication interface: objects of `kinds` whose priority is in
/// `side_a` on one process and in `side_b` on another.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub kinds: Vec<ObjectKind>,
    pub side_a: Vec<Priority>,
    pub side_b: Vec<Priority>,
}

/// Identifier returned by [`ReplicationMiddleware::declare_interface`].
pub type InterfaceId = usize;

/// Outcome of one committed transfer session.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransferReport {
    pub master_copies: usize,
    pub border_copies: usize,
    pub ghost_copies: usize,
    pub vghost_copies: usize,
    pub deletes: usize,
    /// Copies addressed to another rank.
    pub sent_off_rank: usize,
    /// Local objects whose priority changed or which were removed.
    pub applied_locally: usize,
    pub elapsed: Duration,
}

impl TransferReport {
    /// Count one copy directive.
    pub fn count_copy(&mut self, priority: Priority) {
        match priority {
            Priority::Master => self.master_copies += 1,
            Priority::Border => self.border_copies += 1,
            Priority::Ghost => self.ghost_copies += 1,
            Priority::VGhost => self.vghost_copies += 1,
        }
    }

    pub fn total_copies(&self) -> usize {
        self.master_copies + self.border_copies + self.ghost_copies + self.vghost_copies
    }
}

/// Replication middleware as seen by the distribution layer.
pub trait ReplicationMiddleware {
    /// Register an object kind with its payload size.
    fn register_type(&mut self, kind: ObjectKind, size: usize);

    /// Bind a communication interface to a (kind set, priority pair).
    fn declare_interface(&mut self, decl: InterfaceDecl) -> InterfaceId;

    /// Open a transfer session (collective).
    fn begin_session(&mut self) -> Result<(), MeshDistribError>;

    /// Request a copy of `object` on `dest` with `priority`.
    fn copy(
        &mut self,
        object: ObjectRef,
        dest: Rank,
        priority: Priority,
    ) -> Result<(), MeshDistribError> {
        self.copy_sized(object, dest, priority, None)
    }

    /// [`copy`](Self::copy) with an explicit payload size.
    fn copy_sized(
        &mut self,
        object: ObjectRef,
        dest: Rank,
        priority: Priority,
        size: Option<usize>,
    ) -> Result<(), MeshDistribError>;

    /// Request deletion of the local copy of `object`.
    fn delete(&mut self, object: ObjectRef) -> Result<(), MeshDistribError>;

    /// Commit the session (collective) and apply its outcome to `mg`.
    fn end_session(&mut self, mg: &mut MultiGrid) -> Result<TransferReport, MeshDistribError>;

    /// Current priority of the local copy, `None` if there is none.
    fn priority(&self, mg: &MultiGrid, object: ObjectRef) -> Option<Priority>;

    /// Global identifier of `object`.
    fn global_id(&self, object: ObjectRef) -> GlobalId;

    /// Ranks currently known to hold a copy of `object`.
    fn holders(&self, mg: &MultiGrid, object: ObjectRef) -> Vec<Rank>;

    /// Global consistency check; returns the number of violations found.
    fn consistency_check(&self, mg: &MultiGrid) -> usize;

    /// Enable or disable verbose transfer statistics; returns the old setting.
    fn set_transfer_stats(&mut self, on: bool) -> bool;

    /// Human-readable middleware status.
    fn status(&self) -> String;

    /// Declared interfaces in declaration order.
    fn interfaces(&self) -> &[InterfaceDecl];
}
