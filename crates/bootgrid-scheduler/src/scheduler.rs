//! SchedulerCore: places discovery tasks and decides when a deployment is
//! ready.
//!
//! The cluster-manager adapter delivers [`SchedulerEvent`]s; the core
//! answers through a [`SchedulerDriver`]. Placement is greedy: offers are
//! taken in delivery order, one task per host, until `workers` tasks are
//! running. Every offer is either accepted or explicitly declined.
//!
//! A host's lifecycle:
//!
//! ```text
//! offer accepted ── discovery task ── FINISHED(telemetry)
//!        │                                  │
//!   ExecutorRecord                 launch-service message ── ack
//!                                                              │
//!                        all acks in, sent == received ── Orchestrator::run ── stop
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use bootgrid_core::protocol::{self, LaunchCommand, Telemetry, WORKER_PORT};
use bootgrid_core::{
    AgentId, ExecutorDescriptor, ExecutorId, FrameworkConfig, FrameworkId, Offer, Resources,
    SchedulerDriver, TaskId, TaskState, TaskStatus,
};

use crate::error::{SchedulerError, SchedulerResult};
use crate::executors::{ExecutorRecord, ExecutorStore};
use crate::orchestrator::{Deployment, Orchestrator};
use crate::registry::{TaskRegistry, Transition};

/// Callbacks the cluster manager delivers to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Registered(FrameworkId),
    ResourceOffers(Vec<Offer>),
    StatusUpdate(TaskStatus),
    FrameworkMessage {
        executor_id: ExecutorId,
        agent_id: AgentId,
        data: Vec<u8>,
    },
}

/// Progress counters. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub tasks_launched: u32,
    pub tasks_finished: u32,
    pub messages_sent: u32,
    pub messages_received: u32,
    /// Executor messages that arrived after the completion checkpoint.
    pub messages_ignored: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Placing tasks and collecting acknowledgements.
    Deploying,
    Orchestrating,
    Completed,
    Failed,
}

/// What an executor message did to the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Pending { received: u32, expected: u32 },
    Orchestrated,
    /// Arrived after the checkpoint; not counted.
    Ignored,
}

/// All mutable scheduler state, behind one lock.
#[derive(Debug)]
struct FrameworkState {
    framework_id: Option<FrameworkId>,
    counters: Counters,
    tasks: TaskRegistry,
    executors: ExecutorStore,
    phase: Phase,
}

pub struct SchedulerCore {
    executor: ExecutorDescriptor,
    workers: u32,
    group: String,
    prefix: String,
    resources: Resources,
    grace_period: Duration,
    orchestrator: Arc<dyn Orchestrator>,
    state: Mutex<FrameworkState>,
}

impl SchedulerCore {
    pub fn new(
        config: &FrameworkConfig,
        executor: ExecutorDescriptor,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        Self {
            executor,
            workers: config.workers,
            group: config.group.clone(),
            prefix: config.prefix.clone(),
            resources: Resources::new(config.cpus, config.mem),
            grace_period: Duration::from_millis(config.grace_period_ms),
            orchestrator,
            state: Mutex::new(FrameworkState {
                framework_id: None,
                counters: Counters::default(),
                tasks: TaskRegistry::new(),
                executors: ExecutorStore::new(),
                phase: Phase::Deploying,
            }),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn executor(&self) -> &ExecutorDescriptor {
        &self.executor
    }

    /// Number of executors this deployment needs (`n_exe`).
    pub fn workers(&self) -> u32 {
        self.workers
    }

    /// Dispatch one cluster-manager callback.
    pub async fn handle(
        &self,
        driver: &dyn SchedulerDriver,
        event: SchedulerEvent,
    ) -> SchedulerResult<()> {
        match event {
            SchedulerEvent::Registered(framework_id) => {
                self.registered(framework_id).await;
                Ok(())
            }
            SchedulerEvent::ResourceOffers(offers) => {
                self.resource_offers(driver, offers).await;
                Ok(())
            }
            SchedulerEvent::StatusUpdate(status) => self.status_update(driver, status).await,
            SchedulerEvent::FrameworkMessage {
                executor_id,
                agent_id,
                data,
            } => self
                .framework_message(driver, &executor_id, &agent_id, &data)
                .await
                .map(|_| ()),
        }
    }

    /// The cluster manager accepted our registration.
    pub async fn registered(&self, framework_id: FrameworkId) {
        info!(%framework_id, "registered with cluster manager");
        self.state.lock().await.framework_id = Some(framework_id);
    }

    /// Resolve a batch of offers. Returns how many were accepted.
    pub async fn resource_offers(&self, driver: &dyn SchedulerDriver, offers: Vec<Offer>) -> usize {
        debug!(count = offers.len(), "got resource offers");
        let mut state = self.state.lock().await;
        let mut accepted = 0;

        for offer in offers {
            let wanted = state.counters.tasks_launched < self.workers;
            if !wanted || state.executors.contains_host(&offer.hostname) {
                debug!(offer = %offer.id, host = %offer.hostname, "declining offer");
                if let Err(e) = driver.launch_tasks(&offer.id, Vec::new()) {
                    warn!(offer = %offer.id, error = %e, "failed to decline offer");
                }
                continue;
            }

            let task = state.tasks.prepare(&offer, &self.executor, self.resources);
            let task_id = task.task_id;
            if let Err(e) = driver.launch_tasks(&offer.id, vec![task.clone()]) {
                error!(offer = %offer.id, %task_id, error = %e, "failed to launch task");
                if let Err(e) = driver.launch_tasks(&offer.id, Vec::new()) {
                    warn!(offer = %offer.id, error = %e, "failed to decline offer");
                }
                continue;
            }

            state.tasks.insert(task, &offer.hostname);
            let record = ExecutorRecord::new(offer, task_id, self.executor.executor_id.clone());
            info!(%task_id, host = %record.hostname, "accepted offer, launching discovery task");
            if let Err(e) = state.executors.insert(record) {
                error!(%task_id, error = %e, "executor record rejected");
            }
            state.counters.tasks_launched += 1;
            accepted += 1;

            for record in state.executors.records() {
                debug!("{record}");
            }
        }

        accepted
    }

    /// Apply a task status update. Only FINISHED moves the deployment on.
    ///
    /// A FINISHED update is applied only once its telemetry has been parsed
    /// and the launch-service message sent. On error the task keeps its
    /// previous state, so a later FINISHED for it is processed normally.
    pub async fn status_update(
        &self,
        driver: &dyn SchedulerDriver,
        status: TaskStatus,
    ) -> SchedulerResult<()> {
        let mut state = self.state.lock().await;
        let task_id = status.task_id;
        debug!(%task_id, state = %status.state, "task status update");

        if let Transition::Duplicate(s) = state.tasks.check(task_id, status.state)? {
            debug!(%task_id, state = %s, "duplicate status update ignored");
            return Ok(());
        }

        match status.state {
            TaskState::Finished => {}
            TaskState::Running => {
                state.tasks.transition(task_id, status.state)?;
                info!(%task_id, "discovery task running");
                return Ok(());
            }
            TaskState::Lost | TaskState::Failed | TaskState::Killed => {
                state.tasks.transition(task_id, status.state)?;
                warn!(
                    %task_id,
                    state = %status.state,
                    message = %String::from_utf8_lossy(&status.data),
                    "discovery task did not finish"
                );
                return Ok(());
            }
            TaskState::Launched => {
                state.tasks.transition(task_id, status.state)?;
                return Ok(());
            }
        }

        let telemetry = Telemetry::from_bytes(&status.data)?;
        let agent_id = self.agent_for(&state, task_id)?;
        let executor_id = state.executors.undiscovered(&agent_id)?.executor_id.clone();
        let command = LaunchCommand::worker(&self.executor.command, WORKER_PORT);
        driver.send_framework_message(&executor_id, &agent_id, command.to_bytes()?)?;

        state.tasks.transition(task_id, TaskState::Finished)?;
        state.counters.tasks_finished += 1;
        if state.counters.tasks_finished == self.workers {
            info!(workers = self.workers, "init tasks completed");
        }

        let record = state
            .executors
            .record_discovery(&agent_id, &telemetry.ip_addr, WORKER_PORT)?;
        info!(
            %task_id,
            host = %record.hostname,
            ip = %telemetry.ip_addr,
            reported_host = telemetry.hostname.as_deref().unwrap_or("-"),
            "resource telemetry"
        );
        state.counters.messages_sent += 1;
        debug!(%task_id, argv = ?command.argv(), "launch-service message sent");

        Ok(())
    }

    /// Count an executor acknowledgement and, once all are in, orchestrate.
    ///
    /// Returns [`SchedulerError::MessageCountMismatch`] when the count of
    /// received messages reaches `workers` but differs from the count sent.
    pub async fn framework_message(
        &self,
        driver: &dyn SchedulerDriver,
        executor_id: &ExecutorId,
        agent_id: &AgentId,
        data: &[u8],
    ) -> SchedulerResult<MessageOutcome> {
        let deployment = {
            let mut state = self.state.lock().await;

            if state.phase != Phase::Deploying {
                state.counters.messages_ignored += 1;
                warn!(
                    %executor_id,
                    %agent_id,
                    phase = ?state.phase,
                    ignored = state.counters.messages_ignored,
                    "executor message after completion checkpoint ignored"
                );
                return Ok(MessageOutcome::Ignored);
            }

            state.counters.messages_received += 1;
            let Counters {
                messages_sent: sent,
                messages_received: received,
                ..
            } = state.counters;

            if !protocol::is_service_ack(data) {
                warn!(
                    %agent_id,
                    message = %String::from_utf8_lossy(data),
                    "unexpected executor message"
                );
            }
            info!(%executor_id, %agent_id, received, expected = self.workers, "executor message received");

            if received < self.workers {
                return Ok(MessageOutcome::Pending {
                    received,
                    expected: self.workers,
                });
            }

            if received != sent {
                state.phase = Phase::Failed;
                error!(sent, received, "message count mismatch, refusing to orchestrate");
                return Err(SchedulerError::MessageCountMismatch { sent, received });
            }

            state.phase = Phase::Orchestrating;
            for record in state.executors.records() {
                info!("{record}");
            }
            info!("all executors launched and init tasks completed");

            Deployment {
                group: self.group.clone(),
                prefix: self.prefix.clone(),
                executors: state.executors.records().to_vec(),
                uris: state.executors.uris(),
            }
        };

        // Let freshly spawned workers bind their port.
        tokio::time::sleep(self.grace_period).await;

        info!(group = %deployment.group, workers = deployment.uris.len(), "starting orchestration");
        let result = self.orchestrator.run(&deployment).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                state.phase = Phase::Completed;
                info!("orchestration finished, stopping framework");
                driver.stop();
                Ok(MessageOutcome::Orchestrated)
            }
            Err(e) => {
                state.phase = Phase::Failed;
                error!(error = %e, "orchestration failed");
                Err(SchedulerError::Orchestration(e))
            }
        }
    }

    /// Find the executor record for a host, by agent id.
    pub async fn lookup_executor(&self, agent_id: &AgentId) -> Option<ExecutorRecord> {
        self.state.lock().await.executors.lookup(agent_id).cloned()
    }

    pub async fn counters(&self) -> Counters {
        self.state.lock().await.counters
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn framework_id(&self) -> Option<FrameworkId> {
        self.state.lock().await.framework_id.clone()
    }

    pub async fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        self.state.lock().await.tasks.get(task_id).map(|e| e.state)
    }

    pub async fn executor_records(&self) -> Vec<ExecutorRecord> {
        self.state.lock().await.executors.records().to_vec()
    }

    fn agent_for(&self, state: &FrameworkState, task_id: TaskId) -> SchedulerResult<AgentId> {
        state
            .tasks
            .get(task_id)
            .map(|e| e.agent_id().clone())
            .ok_or(SchedulerError::UnknownTask(task_id))
    }
}
