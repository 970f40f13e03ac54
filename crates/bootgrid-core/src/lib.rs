//! bootgrid-core: shared types for the bootgrid scheduler and executors.
//!
//! - **`types`**: offers, tasks, descriptors, task states
//! - **`protocol`**: telemetry, launch-service command, acknowledgement
//! - **`driver`**: outbound interfaces to the cluster manager
//! - **`config`**: bootgrid.toml and environment toggles

pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{ConfigFile, EnvToggles, FrameworkConfig};
pub use driver::{DriverHandle, ExecutorDriver, SchedulerDriver};
pub use error::{ConfigError, DriverError, ProtocolError, ProtocolResult};
pub use protocol::{LaunchCommand, SERVICE_LAUNCHED_ACK, Telemetry, WORKER_PORT};
pub use types::*;
