//! LocalCluster: an in-process cluster manager.
//!
//! Offers every configured host to the scheduler, runs one
//! [`ExecutorAgent`] per host that accepts a task, and routes status
//! updates and messages between them. Callbacks reach the scheduler one at
//! a time, in the order the event loop receives them.
//!
//! Worker services started by the agents belong to the cluster: they are
//! killed when [`DriverHandle::run`] returns, however the run ended.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use bootgrid_core::{
    AgentId, Credential, DriverError, DriverHandle, DriverStatus, ExecutorId, FrameworkDescriptor,
    FrameworkId, Offer, OfferId, SchedulerDriver, TaskInfo, Telemetry,
};
use bootgrid_executor::{ExecutorAgent, StaticDiscovery, Worker};
use bootgrid_scheduler::{DriverFactory, SchedulerCore, SchedulerEvent};

use crate::config::{LocalClusterConfig, LocalHost};
use crate::driver::{ClusterCommand, CommandSender, LocalExecutorDriver, LocalSchedulerDriver};

/// Builds the agent that runs on a host once it accepts a task.
pub type AgentFactory = Arc<dyn Fn(&LocalHost) -> ExecutorAgent + Send + Sync>;

/// Hosts with a fixed IP report it as-is; others discover the machine.
pub fn default_agent(host: &LocalHost) -> ExecutorAgent {
    match &host.ip {
        Some(ip) => {
            let mut telemetry = Telemetry::new(ip.clone());
            telemetry.hostname = Some(host.hostname.clone());
            telemetry.cpus = Some(host.cpus as usize);
            ExecutorAgent::new().with_discovery(Arc::new(StaticDiscovery::new(telemetry)))
        }
        None => ExecutorAgent::new(),
    }
}

struct RunningExecutor {
    executor_id: ExecutorId,
    agent: ExecutorAgent,
    driver: Arc<LocalExecutorDriver>,
    workers: Vec<Worker>,
}

struct HostSlot {
    host: LocalHost,
    agent_id: AgentId,
    /// Outstanding offer for this host, if any.
    offer: Option<OfferId>,
    executor: Option<RunningExecutor>,
}

enum Wake {
    Command(Option<ClusterCommand>),
    Reoffer,
}

pub struct LocalCluster {
    scheduler: SchedulerCore,
    framework: FrameworkDescriptor,
    master: String,
    credential: Option<Credential>,
    config: LocalClusterConfig,
    agents: AgentFactory,
    tx: CommandSender,
    rx: Option<mpsc::UnboundedReceiver<ClusterCommand>>,
    driver: LocalSchedulerDriver,
    hosts: Vec<HostSlot>,
    offers: HashMap<OfferId, usize>,
    next_offer: u64,
    status: DriverStatus,
}

impl LocalCluster {
    pub fn new(
        scheduler: SchedulerCore,
        framework: FrameworkDescriptor,
        master: &str,
        credential: Option<Credential>,
        config: LocalClusterConfig,
        agents: AgentFactory,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let hosts = config
            .hosts
            .iter()
            .enumerate()
            .map(|(i, host)| HostSlot {
                host: host.clone(),
                agent_id: AgentId::new(format!("{}-S{i}", host.hostname)),
                offer: None,
                executor: None,
            })
            .collect();

        Self {
            scheduler,
            framework,
            master: master.to_string(),
            credential,
            config,
            agents,
            driver: LocalSchedulerDriver::new(tx.clone()),
            tx,
            rx: Some(rx),
            hosts,
            offers: HashMap::new(),
            next_offer: 0,
            status: DriverStatus::NotStarted,
        }
    }

    /// The scheduler driver handed to the scheduler's callbacks.
    pub fn scheduler_driver(&self) -> LocalSchedulerDriver {
        self.driver.clone()
    }

    pub fn scheduler(&self) -> &SchedulerCore {
        &self.scheduler
    }

    /// Number of hosts running an executor.
    pub fn executors(&self) -> usize {
        self.hosts.iter().filter(|h| h.executor.is_some()).count()
    }

    /// A driver speaking for an executor on `hostname` that the cluster did
    /// not start itself. Its messages reach the scheduler like any other.
    pub fn executor_driver(
        &self,
        hostname: &str,
        executor_id: ExecutorId,
    ) -> Option<LocalExecutorDriver> {
        let slot = self.hosts.iter().find(|h| h.host.hostname == hostname)?;
        Some(LocalExecutorDriver::new(executor_id, slot.agent_id.clone(), self.tx.clone()))
    }

    /// Deliver one callback. `Some` ends the run.
    async fn deliver(&self, event: SchedulerEvent) -> Option<DriverStatus> {
        match self.scheduler.handle(&self.driver, event).await {
            Ok(()) => None,
            Err(e) if e.is_fatal() => {
                error!(error = %e, "fatal scheduler error, aborting framework");
                Some(DriverStatus::Aborted)
            }
            Err(e) => {
                warn!(error = %e, "scheduler callback failed");
                None
            }
        }
    }

    /// Offer every host that has neither an outstanding offer nor an executor.
    fn offer_idle_hosts(&mut self) -> Vec<Offer> {
        let mut offers = Vec::new();
        for (idx, slot) in self.hosts.iter_mut().enumerate() {
            if slot.offer.is_some() || slot.executor.is_some() {
                continue;
            }
            let id = OfferId::new(format!("offer-{}", self.next_offer));
            self.next_offer += 1;
            slot.offer = Some(id.clone());
            self.offers.insert(id.clone(), idx);
            offers.push(Offer {
                id,
                agent_id: slot.agent_id.clone(),
                hostname: slot.host.hostname.clone(),
                resources: slot.host.resources(),
            });
        }
        offers
    }

    async fn reoffer(&mut self) -> Option<DriverStatus> {
        let offers = self.offer_idle_hosts();
        if offers.is_empty() {
            return None;
        }
        debug!(count = offers.len(), "re-offering idle hosts");
        self.deliver(SchedulerEvent::ResourceOffers(offers)).await
    }

    fn launch(&mut self, offer_id: OfferId, tasks: Vec<TaskInfo>) {
        let Some(idx) = self.offers.remove(&offer_id) else {
            warn!(error = %DriverError::UnknownOffer(offer_id.to_string()), "launch ignored");
            return;
        };
        let tx = self.tx.clone();
        let slot = &mut self.hosts[idx];
        slot.offer = None;

        if tasks.is_empty() {
            debug!(offer = %offer_id, host = %slot.host.hostname, "offer declined");
            return;
        }

        for task in tasks {
            let executor = slot.executor.get_or_insert_with(|| {
                let executor_id = task.executor.executor_id.clone();
                info!(
                    host = %slot.host.hostname,
                    agent = %slot.agent_id,
                    %executor_id,
                    command = %task.executor.command,
                    "starting executor"
                );
                RunningExecutor {
                    driver: Arc::new(LocalExecutorDriver::new(
                        executor_id.clone(),
                        slot.agent_id.clone(),
                        tx.clone(),
                    )),
                    agent: (self.agents)(&slot.host),
                    executor_id,
                    workers: Vec::new(),
                }
            });
            debug!(task_id = %task.task_id, host = %slot.host.hostname, "task handed to executor");
            executor.agent.launch_task(executor.driver.clone(), task);
        }
    }

    fn deliver_to_executor(&mut self, executor_id: &ExecutorId, agent_id: &AgentId, data: &[u8]) {
        let executor = self
            .hosts
            .iter_mut()
            .find(|h| &h.agent_id == agent_id)
            .and_then(|h| h.executor.as_mut())
            .filter(|e| &e.executor_id == executor_id);

        let Some(executor) = executor else {
            let e = DriverError::UnknownExecutor {
                executor_id: executor_id.to_string(),
                agent_id: agent_id.to_string(),
            };
            warn!(error = %e, "framework message dropped");
            return;
        };

        match executor.agent.framework_message(&*executor.driver, data) {
            Ok(worker) => executor.workers.push(worker),
            Err(e) => warn!(%agent_id, error = %e, "executor failed to handle framework message"),
        }
    }

    /// Kill every worker service the agents started.
    async fn teardown(&mut self) {
        for slot in &mut self.hosts {
            let Some(executor) = slot.executor.as_mut() else {
                continue;
            };
            for worker in executor.workers.drain(..) {
                debug!(host = %slot.host.hostname, pid = ?worker.pid(), "stopping worker service");
                if let Err(e) = worker.terminate().await {
                    warn!(host = %slot.host.hostname, error = %e, "worker service left running");
                }
            }
        }
    }

    async fn dispatch(&mut self, command: ClusterCommand) -> Option<DriverStatus> {
        match command {
            ClusterCommand::LaunchTasks { offer_id, tasks } => {
                self.launch(offer_id, tasks);
                None
            }
            ClusterCommand::ToExecutor {
                executor_id,
                agent_id,
                data,
            } => {
                self.deliver_to_executor(&executor_id, &agent_id, &data);
                None
            }
            ClusterCommand::StatusUpdate(status) => {
                self.deliver(SchedulerEvent::StatusUpdate(status)).await
            }
            ClusterCommand::ToScheduler {
                executor_id,
                agent_id,
                data,
            } => {
                self.deliver(SchedulerEvent::FrameworkMessage {
                    executor_id,
                    agent_id,
                    data,
                })
                .await
            }
            ClusterCommand::Stop => {
                info!("framework stop requested");
                Some(DriverStatus::Stopped)
            }
            ClusterCommand::Abort => {
                warn!("framework abort requested");
                Some(DriverStatus::Aborted)
            }
        }
    }

    async fn register(&mut self) -> Option<DriverStatus> {
        if let Err(e) = self.config.validate() {
            error!(error = %e, "invalid local cluster");
            return Some(DriverStatus::Aborted);
        }
        info!(
            master = %self.master,
            framework = %self.framework.name,
            checkpoint = self.framework.checkpoint,
            hosts = self.hosts.len(),
            "starting local cluster"
        );
        if let Some(credential) = &self.credential {
            info!(principal = %credential.principal, "authenticating framework");
        }

        let framework_id = FrameworkId::new(format!("local-{}", std::process::id()));
        if let Some(status) = self.deliver(SchedulerEvent::Registered(framework_id)).await {
            return Some(status);
        }
        let offers = self.offer_idle_hosts();
        self.deliver(SchedulerEvent::ResourceOffers(offers)).await
    }
}

impl DriverHandle for LocalCluster {
    async fn run(&mut self) -> DriverStatus {
        let Some(mut rx) = self.rx.take() else {
            return self.status;
        };
        self.status = DriverStatus::Running;

        let status = match self.register().await {
            Some(status) => status,
            None => {
                let mut reoffer = tokio::time::interval(self.config.offer_interval());
                reoffer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                reoffer.tick().await;

                loop {
                    let wake = tokio::select! {
                        command = rx.recv() => Wake::Command(command),
                        _ = reoffer.tick() => Wake::Reoffer,
                    };
                    let outcome = match wake {
                        Wake::Command(Some(command)) => self.dispatch(command).await,
                        Wake::Command(None) => Some(DriverStatus::Aborted),
                        Wake::Reoffer => self.reoffer().await,
                    };
                    if let Some(status) = outcome {
                        break status;
                    }
                }
            }
        };

        drop(rx);
        self.teardown().await;
        self.status = status;
        info!(?status, executors = self.executors(), "local cluster shut down");
        status
    }

    fn stop(&self) {
        self.driver.stop();
    }
}

/// Creates a [`LocalCluster`] for [`bootgrid_scheduler::start_framework`].
pub struct LocalClusterFactory {
    config: LocalClusterConfig,
    agents: AgentFactory,
}

impl LocalClusterFactory {
    pub fn new(config: LocalClusterConfig) -> Self {
        Self {
            config,
            agents: Arc::new(default_agent),
        }
    }

    pub fn with_agent_factory(
        mut self,
        agents: impl Fn(&LocalHost) -> ExecutorAgent + Send + Sync + 'static,
    ) -> Self {
        self.agents = Arc::new(agents);
        self
    }
}

impl DriverFactory for LocalClusterFactory {
    type Driver = LocalCluster;

    fn create(
        self,
        scheduler: SchedulerCore,
        framework: FrameworkDescriptor,
        master: &str,
        credential: Option<Credential>,
    ) -> LocalCluster {
        LocalCluster::new(scheduler, framework, master, credential, self.config, self.agents)
    }
}

#[cfg(test)]
mod tests {
    use bootgrid_core::{ExecutorDescriptor, FrameworkConfig};
    use bootgrid_scheduler::{BoxFuture, Deployment, Orchestrator};

    use super::*;

    struct Idle;

    impl Orchestrator for Idle {
        fn run<'a>(&'a self, _: &'a Deployment) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn cluster(hosts: &[&str]) -> LocalCluster {
        let executor = ExecutorDescriptor {
            executor_id: ExecutorId::new("exe"),
            command: "/opt/bootgrid/worker".to_string(),
            name: "bootgrid executor".to_string(),
            source: "per-job build".to_string(),
        };
        let scheduler = SchedulerCore::new(&FrameworkConfig::default(), executor, Arc::new(Idle));
        let framework = FrameworkDescriptor {
            name: "test".to_string(),
            user: String::new(),
            checkpoint: false,
        };
        let config = LocalClusterConfig::new(hosts.iter().map(|h| LocalHost::new(*h)).collect());
        LocalClusterFactory::new(config).create(scheduler, framework, "local", None)
    }

    #[test]
    fn hosts_are_offered_once_until_declined() {
        let mut cluster = cluster(&["h1", "h2"]);
        let offers = cluster.offer_idle_hosts();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].agent_id.as_str(), "h1-S0");
        assert_ne!(offers[0].id, offers[1].id);
        assert!(cluster.offer_idle_hosts().is_empty());

        cluster.launch(offers[1].id.clone(), Vec::new());
        let again = cluster.offer_idle_hosts();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].hostname, "h2");
        assert_ne!(again[0].id, offers[1].id);
    }

    #[test]
    fn unknown_offer_is_ignored() {
        let mut cluster = cluster(&["h1"]);
        cluster.launch(OfferId::new("offer-99"), Vec::new());
        assert_eq!(cluster.executors(), 0);
    }

    #[tokio::test]
    async fn stop_before_run_ends_with_stopped() {
        let mut cluster = cluster(&["h1"]);
        cluster.stop();
        assert_eq!(cluster.run().await, DriverStatus::Stopped);
        assert_eq!(cluster.executors(), 0);
        // A finished driver keeps reporting how it ended.
        assert_eq!(cluster.run().await, DriverStatus::Stopped);
    }

    #[tokio::test]
    async fn abort_ends_with_aborted() {
        let mut cluster = cluster(&["h1"]);
        cluster.scheduler_driver().abort();
        assert_eq!(cluster.run().await, DriverStatus::Aborted);
    }

    #[test]
    fn executor_driver_targets_the_named_host() {
        let cluster = cluster(&["h1", "h2"]);
        let driver = cluster.executor_driver("h2", ExecutorId::new("exe")).unwrap();
        assert_eq!(driver.agent_id().as_str(), "h2-S1");
        assert!(cluster.executor_driver("h9", ExecutorId::new("exe")).is_none());
    }

    #[tokio::test]
    async fn empty_cluster_aborts() {
        let mut cluster = cluster(&[]);
        assert_eq!(cluster.run().await, DriverStatus::Aborted);
    }
}
