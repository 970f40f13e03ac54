//! Scheduler error types.

use bootgrid_core::{AgentId, ConfigError, DriverError, ProtocolError, TaskId, TaskState};
use thiserror::Error;

/// Errors that can occur while placing and tracking a deployment.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("task {task_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskState,
        to: TaskState,
    },

    #[error("no executor record for agent {0}")]
    UnknownExecutor(AgentId),

    #[error("host already has an executor: {0}")]
    DuplicateHost(String),

    #[error("executor on {0} already reported its address")]
    AlreadyDiscovered(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("message count mismatch: sent {sent}, received {received}")]
    MessageCountMismatch { sent: u32, received: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("orchestration failed: {0}")]
    Orchestration(#[source] anyhow::Error),
}

impl SchedulerError {
    /// Fatal errors end the deployment; the process exits non-zero.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::MessageCountMismatch { .. }
                | SchedulerError::Config(_)
                | SchedulerError::Orchestration(_)
        )
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
