use crate::partitioning::rcb::DEFAULT_RCB_TOLERANCE;
use crate::partitioning::structured::{DEFAULT_DD_EPSILON, DEFAULT_DD_THRESHOLD};
use crate::topology::multigrid::Rank;

/// Tunables of [`LoadBalancer`](super::LoadBalancer).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BalanceConfig {
    /// Rank that runs centralised partitioning and receives collected data.
    pub coordinator: Rank,
    /// Largest per-process element count a structured decomposition
    /// moves in one transfer.
    pub dd_threshold: usize,
    /// Quantum of the RCB sort key.
    pub rcb_tolerance: f64,
    /// Shift applied to corners before the box lookup.
    pub dd_epsilon: f64,
    /// Verbose transfer statistics even without the `+100` mode offset.
    pub verbose_transfers: bool,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            coordinator: 0,
            dd_threshold: DEFAULT_DD_THRESHOLD,
            rcb_tolerance: DEFAULT_RCB_TOLERANCE,
            dd_epsilon: DEFAULT_DD_EPSILON,
            verbose_transfers: false,
        }
    }
}
