//! Outbound driver interfaces.
//!
//! The scheduler and the executor agents never talk to the cluster manager
//! directly. They call these traits, implemented by an adapter that owns
//! the actual transport. Calls are expected to enqueue and return quickly.

use std::future::Future;

use crate::error::DriverError;
use crate::types::{AgentId, DriverStatus, ExecutorId, OfferId, TaskInfo, TaskStatus};

/// Calls the scheduler makes into the cluster manager.
pub trait SchedulerDriver: Send + Sync {
    /// Resolve an offer. An empty task list declines it.
    fn launch_tasks(&self, offer_id: &OfferId, tasks: Vec<TaskInfo>) -> Result<(), DriverError>;

    /// Best-effort message to one executor.
    fn send_framework_message(
        &self,
        executor_id: &ExecutorId,
        agent_id: &AgentId,
        data: Vec<u8>,
    ) -> Result<(), DriverError>;

    /// Stop the framework; tears down every executor.
    fn stop(&self);

    /// Terminate the framework because of a fatal condition.
    fn abort(&self);
}

/// Calls an executor makes into the cluster manager.
pub trait ExecutorDriver: Send + Sync {
    fn send_status_update(&self, status: TaskStatus) -> Result<(), DriverError>;

    /// Best-effort message to the scheduler.
    fn send_framework_message(&self, data: Vec<u8>) -> Result<(), DriverError>;
}

/// Lifecycle of a driver: run until stopped, report how it ended.
pub trait DriverHandle {
    /// Run until stopped or aborted.
    fn run(&mut self) -> impl Future<Output = DriverStatus> + Send;

    /// Request a stop. Idempotent.
    fn stop(&self);
}
