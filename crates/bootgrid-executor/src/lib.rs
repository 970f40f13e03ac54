//! bootgrid-executor: the per-host agent.
//!
//! One [`ExecutorAgent`] runs on every host that accepted a discovery task.
//! It reports the host's telemetry, then starts the worker service when the
//! scheduler sends the launch-service message.

pub mod agent;
pub mod discovery;
pub mod error;
pub mod launcher;

pub use agent::{ExecutorAgent, run_executor};
pub use discovery::{Discovery, StaticDiscovery, SystemDiscovery};
pub use error::{ExecutorError, ExecutorResult};
pub use launcher::{Launcher, ProcessLauncher, Worker};
