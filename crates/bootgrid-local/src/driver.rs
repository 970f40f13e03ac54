//! Driver handles that enqueue onto the local cluster's event loop.

use tokio::sync::mpsc;

use bootgrid_core::{
    AgentId, DriverError, ExecutorDriver, ExecutorId, OfferId, SchedulerDriver, TaskInfo,
    TaskStatus,
};

/// Everything the event loop acts on.
#[derive(Debug)]
pub(crate) enum ClusterCommand {
    LaunchTasks {
        offer_id: OfferId,
        tasks: Vec<TaskInfo>,
    },
    /// Scheduler → executor.
    ToExecutor {
        executor_id: ExecutorId,
        agent_id: AgentId,
        data: Vec<u8>,
    },
    StatusUpdate(TaskStatus),
    /// Executor → scheduler.
    ToScheduler {
        executor_id: ExecutorId,
        agent_id: AgentId,
        data: Vec<u8>,
    },
    Stop,
    Abort,
}

pub(crate) type CommandSender = mpsc::UnboundedSender<ClusterCommand>;

fn enqueue(tx: &CommandSender, command: ClusterCommand) -> Result<(), DriverError> {
    tx.send(command).map_err(|_| DriverError::NotRunning)
}

/// The scheduler's side of the local cluster.
#[derive(Debug, Clone)]
pub struct LocalSchedulerDriver {
    tx: CommandSender,
}

impl LocalSchedulerDriver {
    pub(crate) fn new(tx: CommandSender) -> Self {
        Self { tx }
    }
}

impl SchedulerDriver for LocalSchedulerDriver {
    fn launch_tasks(&self, offer_id: &OfferId, tasks: Vec<TaskInfo>) -> Result<(), DriverError> {
        enqueue(
            &self.tx,
            ClusterCommand::LaunchTasks {
                offer_id: offer_id.clone(),
                tasks,
            },
        )
    }

    fn send_framework_message(
        &self,
        executor_id: &ExecutorId,
        agent_id: &AgentId,
        data: Vec<u8>,
    ) -> Result<(), DriverError> {
        enqueue(
            &self.tx,
            ClusterCommand::ToExecutor {
                executor_id: executor_id.clone(),
                agent_id: agent_id.clone(),
                data,
            },
        )
    }

    fn stop(&self) {
        let _ = enqueue(&self.tx, ClusterCommand::Stop);
    }

    fn abort(&self) {
        let _ = enqueue(&self.tx, ClusterCommand::Abort);
    }
}

/// One executor's side of the local cluster.
#[derive(Debug, Clone)]
pub struct LocalExecutorDriver {
    executor_id: ExecutorId,
    agent_id: AgentId,
    tx: CommandSender,
}

impl LocalExecutorDriver {
    pub(crate) fn new(executor_id: ExecutorId, agent_id: AgentId, tx: CommandSender) -> Self {
        Self {
            executor_id,
            agent_id,
            tx,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }
}

impl ExecutorDriver for LocalExecutorDriver {
    fn send_status_update(&self, status: TaskStatus) -> Result<(), DriverError> {
        enqueue(&self.tx, ClusterCommand::StatusUpdate(status))
    }

    fn send_framework_message(&self, data: Vec<u8>) -> Result<(), DriverError> {
        enqueue(
            &self.tx,
            ClusterCommand::ToScheduler {
                executor_id: self.executor_id.clone(),
                agent_id: self.agent_id.clone(),
                data,
            },
        )
    }
}
