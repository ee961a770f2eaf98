//! Load balancing: command surface, configuration and the driver that
//! dispatches a command to a partitioning strategy and the transfer.

pub mod command;
pub mod config;
pub mod orchestrator;

pub use command::{LbCommand, LbStrategy, VERBOSE_OFFSET};
pub use config::BalanceConfig;
pub use orchestrator::{BalanceOutcome, LoadBalancer};
