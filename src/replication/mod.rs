//! Replication middleware seam and the transfer driver.
//!
//! [`middleware`] is the interface consumed from the replication layer,
//! [`local`] an in-process realisation for serial runs and tests, and
//! [`transfer`] the level-wise transfer built on top of both.

pub mod local;
pub mod middleware;
pub mod transfer;

pub use local::LocalMiddleware;
pub use middleware::{
    Directive, GlobalId, InterfaceDecl, InterfaceId, ObjectKind, ObjectRef, ReplicationMiddleware,
    TransferReport,
};
pub use transfer::{register_object_types, transfer_from_level};
