//! Executor records: one per host that accepted a discovery task.
//!
//! A record is created when an offer is accepted and filled in, exactly
//! once, when the host's discovery telemetry arrives.

use std::fmt;

use bootgrid_core::{AgentId, ExecutorId, Offer, TaskId};

use crate::error::{SchedulerError, SchedulerResult};

/// What the scheduler knows about one host's executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorRecord {
    pub hostname: String,
    /// The offer that was accepted for this host.
    pub offer: Offer,
    pub task_id: TaskId,
    pub executor_id: ExecutorId,
    pub ip_addr: Option<String>,
    pub port: Option<u16>,
}

impl ExecutorRecord {
    pub fn new(offer: Offer, task_id: TaskId, executor_id: ExecutorId) -> Self {
        Self {
            hostname: offer.hostname.clone(),
            offer,
            task_id,
            executor_id,
            ip_addr: None,
            port: None,
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.offer.agent_id
    }

    pub fn is_discovered(&self) -> bool {
        self.ip_addr.is_some() && self.port.is_some()
    }

    /// `ip:port` of the worker service, once discovered.
    pub fn uri(&self) -> Option<String> {
        match (&self.ip_addr, self.port) {
            (Some(ip), Some(port)) => Some(format!("{ip}:{port}")),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executor {} on {} (agent {}, task {}, cpus {}, mem {}) at {}",
            self.executor_id,
            self.hostname,
            self.offer.agent_id,
            self.task_id,
            self.offer.resources.cpus,
            self.offer.resources.mem,
            self.uri().as_deref().unwrap_or("<undiscovered>"),
        )
    }
}

/// Executor records in acceptance order.
#[derive(Debug, Default)]
pub struct ExecutorStore {
    records: Vec<ExecutorRecord>,
}

impl ExecutorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ExecutorRecord) -> SchedulerResult<()> {
        if self.contains_host(&record.hostname) {
            return Err(SchedulerError::DuplicateHost(record.hostname));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn contains_host(&self, hostname: &str) -> bool {
        self.records.iter().any(|r| r.hostname == hostname)
    }

    /// Find the record for the host an agent runs on.
    pub fn lookup(&self, agent_id: &AgentId) -> Option<&ExecutorRecord> {
        self.records.iter().find(|r| r.agent_id() == agent_id)
    }

    /// The record for `agent_id`, provided its address is still unknown.
    pub fn undiscovered(&self, agent_id: &AgentId) -> SchedulerResult<&ExecutorRecord> {
        let record = self
            .lookup(agent_id)
            .ok_or_else(|| SchedulerError::UnknownExecutor(agent_id.clone()))?;
        if record.is_discovered() {
            return Err(SchedulerError::AlreadyDiscovered(record.hostname.clone()));
        }
        Ok(record)
    }

    /// Store a host's discovered address. Allowed once per record.
    pub fn record_discovery(
        &mut self,
        agent_id: &AgentId,
        ip_addr: &str,
        port: u16,
    ) -> SchedulerResult<&ExecutorRecord> {
        self.undiscovered(agent_id)?;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.agent_id() == agent_id)
            .ok_or_else(|| SchedulerError::UnknownExecutor(agent_id.clone()))?;
        record.ip_addr = Some(ip_addr.to_string());
        record.port = Some(port);
        Ok(&*record)
    }

    pub fn records(&self) -> &[ExecutorRecord] {
        &self.records
    }

    /// Service URIs of every discovered executor.
    pub fn uris(&self) -> Vec<String> {
        self.records.iter().filter_map(ExecutorRecord::uri).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bootgrid_core::{OfferId, Resources};

    use super::*;

    fn record(n: u64, host: &str) -> ExecutorRecord {
        let offer = Offer {
            id: OfferId::new(format!("offer-{n}")),
            agent_id: AgentId::new(format!("agent-{n}")),
            hostname: host.to_string(),
            resources: Resources::new(2.0, 1024.0),
        };
        ExecutorRecord::new(offer, TaskId(n), ExecutorId::new("exe"))
    }

    #[test]
    fn one_record_per_host() {
        let mut store = ExecutorStore::new();
        store.insert(record(0, "h1")).unwrap();
        let err = store.insert(record(1, "h1")).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateHost(h) if h == "h1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn discovery_fills_ip_and_port() {
        let mut store = ExecutorStore::new();
        store.insert(record(0, "h1")).unwrap();

        let rec = store
            .record_discovery(&AgentId::new("agent-0"), "10.0.0.5", 9311)
            .unwrap();
        assert_eq!(rec.ip_addr.as_deref(), Some("10.0.0.5"));
        assert_eq!(rec.uri().as_deref(), Some("10.0.0.5:9311"));
    }

    #[test]
    fn discovery_happens_once() {
        let mut store = ExecutorStore::new();
        store.insert(record(0, "h1")).unwrap();
        let agent = AgentId::new("agent-0");
        store.record_discovery(&agent, "10.0.0.5", 9311).unwrap();

        let err = store.record_discovery(&agent, "10.0.0.6", 9311).unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyDiscovered(_)));
        assert_eq!(store.lookup(&agent).unwrap().ip_addr.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn undiscovered_checks_without_changing_the_record() {
        let mut store = ExecutorStore::new();
        store.insert(record(0, "h1")).unwrap();
        let agent = AgentId::new("agent-0");

        assert_eq!(store.undiscovered(&agent).unwrap().hostname, "h1");
        assert!(!store.lookup(&agent).unwrap().is_discovered());

        store.record_discovery(&agent, "10.0.0.5", 9311).unwrap();
        assert!(matches!(
            store.undiscovered(&agent),
            Err(SchedulerError::AlreadyDiscovered(_))
        ));
        assert!(matches!(
            store.undiscovered(&AgentId::new("ghost")),
            Err(SchedulerError::UnknownExecutor(_))
        ));
    }

    #[test]
    fn discovery_for_unknown_agent_fails() {
        let mut store = ExecutorStore::new();
        let err = store
            .record_discovery(&AgentId::new("ghost"), "10.0.0.5", 9311)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownExecutor(_)));
    }

    #[test]
    fn uris_skip_undiscovered_records() {
        let mut store = ExecutorStore::new();
        store.insert(record(0, "h1")).unwrap();
        store.insert(record(1, "h2")).unwrap();
        store
            .record_discovery(&AgentId::new("agent-1"), "10.0.0.2", 9311)
            .unwrap();
        assert_eq!(store.uris(), vec!["10.0.0.2:9311".to_string()]);
    }

    #[test]
    fn report_line_mentions_host_and_address() {
        let mut rec = record(3, "h3");
        assert!(rec.to_string().contains("<undiscovered>"));
        rec.ip_addr = Some("10.0.0.3".to_string());
        rec.port = Some(9311);
        let line = rec.to_string();
        assert!(line.contains("h3"));
        assert!(line.contains("10.0.0.3:9311"));
    }
}
