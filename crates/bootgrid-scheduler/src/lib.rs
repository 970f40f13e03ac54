//! bootgrid-scheduler: places discovery tasks on offered hosts and hands
//! the finished deployment to an orchestrator.
//!
//! # Architecture
//!
//! ```text
//! SchedulerCore (one lock over all mutable state)
//!   ├── TaskRegistry   (task id → host, executor, lifecycle state)
//!   ├── ExecutorStore  (host → accepted offer, discovered ip:port)
//!   ├── Counters       (launched / finished / sent / received)
//!   └── Orchestrator   (run once, when every worker has acknowledged)
//! ```
//!
//! The core never talks to a cluster manager itself: an adapter delivers
//! [`SchedulerEvent`]s and implements [`bootgrid_core::SchedulerDriver`].

pub mod error;
pub mod executors;
pub mod framework;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use error::{SchedulerError, SchedulerResult};
pub use executors::{ExecutorRecord, ExecutorStore};
pub use framework::{DriverFactory, start_framework, stop_framework};
pub use orchestrator::{BoxFuture, Deployment, Orchestrator, ProbeOrchestrator};
pub use registry::{TaskEntry, TaskRegistry, Transition};
pub use scheduler::{Counters, MessageOutcome, Phase, SchedulerCore, SchedulerEvent};
