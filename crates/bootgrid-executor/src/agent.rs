//! Executor agent: runs on each host.
//!
//! The agent receives exactly one discovery task, reports the host's
//! telemetry through status updates, and later starts the worker service
//! when the scheduler asks for it.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bootgrid_core::protocol::{DISCOVERY_RUNNING, SERVICE_LAUNCHED_ACK};
use bootgrid_core::{
    DriverHandle, ExecutorDriver, LaunchCommand, TaskInfo, TaskState, TaskStatus,
};

use crate::discovery::{Discovery, SystemDiscovery};
use crate::error::{ExecutorError, ExecutorResult};
use crate::launcher::{Launcher, ProcessLauncher, Worker};

pub struct ExecutorAgent {
    discovery: Arc<dyn Discovery>,
    launcher: Arc<dyn Launcher>,
}

impl ExecutorAgent {
    /// Agent that discovers the running host and spawns real processes.
    pub fn new() -> Self {
        Self {
            discovery: Arc::new(SystemDiscovery::new()),
            launcher: Arc::new(ProcessLauncher),
        }
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Start the discovery task in the background and return at once.
    ///
    /// The driver delivers no further callbacks until this returns, so all
    /// work happens on the spawned task: RUNNING, discovery, then FINISHED
    /// with the telemetry (or FAILED with the discovery error).
    pub fn launch_task(&self, driver: Arc<dyn ExecutorDriver>, task: TaskInfo) -> JoinHandle<()> {
        let discovery = self.discovery.clone();
        tokio::spawn(async move {
            let task_id = task.task_id;
            info!(%task_id, "requested discovery task");
            send_status(&*driver, TaskStatus::new(task_id, TaskState::Running, DISCOVERY_RUNNING));

            let discovered = tokio::task::spawn_blocking(move || discovery.discover())
                .await
                .map_err(|e| ExecutorError::Discovery(e.to_string()))
                .and_then(|r| r);
            let payload = discovered.and_then(|t| Ok(t.to_bytes()?));

            let status = match payload {
                Ok(data) => {
                    debug!(%task_id, telemetry = %String::from_utf8_lossy(&data), "discovery finished");
                    TaskStatus::new(task_id, TaskState::Finished, data)
                }
                Err(e) => {
                    error!(%task_id, error = %e, "discovery failed");
                    TaskStatus::new(task_id, TaskState::Failed, e.to_string())
                }
            };
            send_status(&*driver, status);
        })
    }

    /// Start the worker service named in a launch-service message and
    /// acknowledge it. Nothing is acknowledged if the launch fails.
    ///
    /// The returned [`Worker`] belongs to the caller, which decides whether
    /// the service outlives the executor.
    pub fn framework_message(
        &self,
        driver: &dyn ExecutorDriver,
        data: &[u8],
    ) -> ExecutorResult<Worker> {
        let command = LaunchCommand::from_bytes(data)?;
        info!(argv = ?command.argv(), "received launch-service message");

        let worker = self.launcher.launch(&command)?;
        driver.send_framework_message(SERVICE_LAUNCHED_ACK.as_bytes().to_vec())?;
        Ok(worker)
    }
}

impl Default for ExecutorAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Block until the scheduler stops the driver; return the exit status.
pub async fn run_executor<D: DriverHandle>(driver: &mut D) -> i32 {
    let status = driver.run().await;
    info!(?status, "executor driver finished");
    status.exit_code()
}

fn send_status(driver: &dyn ExecutorDriver, status: TaskStatus) {
    let task_id = status.task_id;
    let state = status.state;
    if let Err(e) = driver.send_status_update(status) {
        warn!(%task_id, %state, error = %e, "failed to send status update");
    }
}
