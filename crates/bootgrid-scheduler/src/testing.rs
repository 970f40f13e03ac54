//! Test doubles shared by the scheduler's unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bootgrid_core::{
    AgentId, DriverError, ExecutorDescriptor, ExecutorId, FrameworkConfig, Offer, OfferId,
    Resources, SchedulerDriver, TaskInfo,
};

use crate::orchestrator::{BoxFuture, Deployment, Orchestrator};
use crate::scheduler::SchedulerCore;

type Launch = (OfferId, Vec<TaskInfo>);
type Message = (ExecutorId, AgentId, Vec<u8>);

#[derive(Default)]
pub struct RecordingDriver {
    launches: Mutex<Vec<Launch>>,
    messages: Mutex<Vec<Message>>,
    stopped: AtomicBool,
    aborted: AtomicBool,
    refuse_launches: AtomicBool,
    refuse_messages: AtomicBool,
}

impl RecordingDriver {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.launches().into_iter().flat_map(|(_, t)| t).collect()
    }

    pub fn declined(&self) -> usize {
        self.launches().iter().filter(|(_, t)| t.is_empty()).count()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Fail every launch that carries tasks. Declines still go through.
    pub fn refuse_launches(&self, refuse: bool) {
        self.refuse_launches.store(refuse, Ordering::SeqCst);
    }

    pub fn refuse_messages(&self, refuse: bool) {
        self.refuse_messages.store(refuse, Ordering::SeqCst);
    }
}

impl SchedulerDriver for RecordingDriver {
    fn launch_tasks(&self, offer_id: &OfferId, tasks: Vec<TaskInfo>) -> Result<(), DriverError> {
        if !tasks.is_empty() && self.refuse_launches.load(Ordering::SeqCst) {
            return Err(DriverError::Transport("launch refused".to_string()));
        }
        self.launches.lock().unwrap().push((offer_id.clone(), tasks));
        Ok(())
    }

    fn send_framework_message(
        &self,
        executor_id: &ExecutorId,
        agent_id: &AgentId,
        data: Vec<u8>,
    ) -> Result<(), DriverError> {
        if self.refuse_messages.load(Ordering::SeqCst) {
            return Err(DriverError::Transport("message refused".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((executor_id.clone(), agent_id.clone(), data));
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingOrchestrator {
    deployments: Mutex<Vec<Deployment>>,
    failure: Mutex<Option<String>>,
}

impl RecordingOrchestrator {
    pub fn deployments(&self) -> Vec<Deployment> {
        self.deployments.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

impl Orchestrator for RecordingOrchestrator {
    fn run<'a>(&'a self, deployment: &'a Deployment) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.deployments.lock().unwrap().push(deployment.clone());
            match self.failure.lock().unwrap().clone() {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        })
    }
}

pub fn offer(n: u32, host: &str) -> Offer {
    Offer {
        id: OfferId::new(format!("offer-{n}")),
        agent_id: AgentId::new(format!("agent-{host}")),
        hostname: host.to_string(),
        resources: Resources::new(4.0, 4096.0),
    }
}

pub fn config(workers: u32) -> FrameworkConfig {
    FrameworkConfig {
        executable: "/opt/bootgrid/worker".to_string(),
        workers,
        group: "ga".to_string(),
        prefix: "/ga".to_string(),
        cpus: 1.0,
        mem: 32.0,
        grace_period_ms: 0,
        ..FrameworkConfig::default()
    }
}

pub fn scheduler(workers: u32) -> (SchedulerCore, Arc<RecordingOrchestrator>) {
    let orchestrator = Arc::new(RecordingOrchestrator::default());
    let executor = ExecutorDescriptor {
        executor_id: ExecutorId::new("exe-test"),
        command: "/opt/bootgrid/worker".to_string(),
        name: "bootgrid executor".to_string(),
        source: "per-job build".to_string(),
    };
    let core = SchedulerCore::new(&config(workers), executor, orchestrator.clone());
    (core, orchestrator)
}
