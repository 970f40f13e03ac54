//! bootgrid-local: run a bootgrid deployment without a cluster manager.
//!
//! [`LocalCluster`] stands in for the resource manager: it offers a fixed
//! list of hosts, starts an executor agent on each host that accepts a
//! discovery task, and carries status updates and framework messages over
//! tokio channels.

pub mod cluster;
pub mod config;
pub mod driver;

pub use cluster::{AgentFactory, LocalCluster, LocalClusterFactory, default_agent};
pub use config::{LocalClusterConfig, LocalHost};
pub use driver::{LocalExecutorDriver, LocalSchedulerDriver};
