//! Worker service launch.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use bootgrid_core::LaunchCommand;

use crate::error::{ExecutorError, ExecutorResult};

/// Starts the worker service described by a launch command.
pub trait Launcher: Send + Sync {
    fn launch(&self, command: &LaunchCommand) -> ExecutorResult<Worker>;
}

/// A started worker service.
///
/// Dropping a `Worker` leaves the process running. Whoever owns the
/// executor's lifetime calls [`Worker::terminate`] when it shuts down.
#[derive(Debug)]
pub struct Worker {
    program: String,
    pid: Option<u32>,
    child: Option<Child>,
}

impl Worker {
    /// A worker this process cannot signal, known at most by pid.
    pub fn detached(program: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            program: program.into(),
            pid,
            child: None,
        }
    }

    fn spawned(program: &str, child: Child) -> Self {
        Self {
            program: program.to_string(),
            pid: child.id(),
            child: Some(child),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kill the process and reap it. A no-op for detached workers and for
    /// processes that already exited.
    pub async fn terminate(mut self) -> ExecutorResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let failed = |source| ExecutorError::Terminate {
            program: self.program.clone(),
            source,
        };

        if let Some(status) = child.try_wait().map_err(failed)? {
            debug!(program = %self.program, pid = ?self.pid, %status, "worker service already exited");
            return Ok(());
        }
        child.kill().await.map_err(failed)?;
        info!(program = %self.program, pid = ?self.pid, "worker service stopped");
        Ok(())
    }
}

/// Spawns the worker as a child process.
///
/// The child outlives its [`Worker`] handle unless terminated.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, command: &LaunchCommand) -> ExecutorResult<Worker> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        let worker = Worker::spawned(&command.program, child);
        info!(program = %command.program, args = ?command.args, pid = ?worker.pid(), "worker service spawned");
        Ok(worker)
    }
}
