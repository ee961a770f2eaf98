//! Entry-point for destination assignment.
//!
//! - [`rcb`]: recursive coordinate bisection over a 2-D process grid
//! - [`structured`]: box decomposition of unit-domain meshes, optionally staged
//! - [`inherit`]: propagation of coarse destinations to refined descendants

pub mod inherit;
pub mod rcb;
pub mod structured;

pub use inherit::{inherit_level, inherit_partition};
pub use rcb::{
    CentroidRecord, DEFAULT_RCB_TOLERANCE, ProcGrid, ProcRect, RcbParams, balance_level_rcb,
    collect_centroids, rcb_assign,
};
pub use structured::{
    BoxShape, DEFAULT_DD_EPSILON, DEFAULT_DD_THRESHOLD, assign_boxes, create_dd, plan_stages,
    structured_decomposition,
};
