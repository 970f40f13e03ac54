//! Executor error types.

use bootgrid_core::{DriverError, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stop {program}: {source}")]
    Terminate {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
