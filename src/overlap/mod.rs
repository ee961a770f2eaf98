//! Overlap planning: which replicas survive a redistribution and which
//! nodes keep their auxiliary data.

pub mod planner;

pub use planner::{OverlapSummary, plan_overlap};
