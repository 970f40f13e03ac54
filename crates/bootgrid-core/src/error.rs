//! Error types shared across bootgrid crates.

use thiserror::Error;

/// Result type alias for wire-protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors encoding or decoding scheduler/executor payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid telemetry payload: {0}")]
    Telemetry(String),

    #[error("invalid launch command: {0}")]
    LaunchCommand(String),

    #[error("encode error: {0}")]
    Encode(String),
}

/// Errors raised by an outbound driver call.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver is not running")]
    NotRunning,

    #[error("unknown offer: {0}")]
    UnknownOffer(String),

    #[error("unknown executor {executor_id} on agent {agent_id}")]
    UnknownExecutor {
        executor_id: String,
        agent_id: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("authentication enabled but {0} is not set")]
    MissingCredential(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}
