//! Orchestration hand-off.
//!
//! Once every worker service is up, the scheduler hands the finished
//! deployment to an [`Orchestrator`], which runs the actual distributed
//! computation against the workers and returns when it is done.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::bail;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::executors::ExecutorRecord;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A finished deployment: every executor discovered and its worker launched.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// Worker-group name.
    pub group: String,
    /// Routing prefix for the workers' endpoints.
    pub prefix: String,
    pub executors: Vec<ExecutorRecord>,
    /// `ip:port` of each worker service, in executor order.
    pub uris: Vec<String>,
}

/// Runs the distributed computation over a deployment, to completion.
pub trait Orchestrator: Send + Sync {
    fn run<'a>(&'a self, deployment: &'a Deployment) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Orchestrator that waits until every worker accepts TCP connections.
///
/// Used for local runs where the computation itself is driven elsewhere.
#[derive(Debug, Clone)]
pub struct ProbeOrchestrator {
    attempts: u32,
    interval: Duration,
    connect_timeout: Duration,
}

impl ProbeOrchestrator {
    pub fn new() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn probe(&self, uri: &str) -> anyhow::Result<()> {
        for attempt in 1..=self.attempts {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(uri)).await {
                Ok(Ok(_)) => {
                    debug!(%uri, attempt, "worker reachable");
                    return Ok(());
                }
                Ok(Err(e)) => debug!(%uri, attempt, error = %e, "worker not reachable yet"),
                Err(_) => debug!(%uri, attempt, "connect timed out"),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        warn!(%uri, attempts = self.attempts, "worker never became reachable");
        bail!("worker {uri} unreachable after {} attempts", self.attempts)
    }
}

impl Default for ProbeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator for ProbeOrchestrator {
    fn run<'a>(&'a self, deployment: &'a Deployment) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            for uri in &deployment.uris {
                self.probe(uri).await?;
            }
            info!(
                group = %deployment.group,
                prefix = %deployment.prefix,
                workers = deployment.uris.len(),
                "deployment ready"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn deployment(uris: Vec<String>) -> Deployment {
        Deployment {
            group: "ga".to_string(),
            prefix: "/ga".to_string(),
            executors: Vec::new(),
            uris,
        }
    }

    #[tokio::test]
    async fn probe_succeeds_when_workers_listen() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uris = vec![
            a.local_addr().unwrap().to_string(),
            b.local_addr().unwrap().to_string(),
        ];

        let orchestrator = ProbeOrchestrator::new().with_attempts(1);
        orchestrator.run(&deployment(uris)).await.unwrap();
    }

    #[tokio::test]
    async fn probe_fails_for_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let orchestrator = ProbeOrchestrator::new()
            .with_attempts(2)
            .with_interval(Duration::from_millis(10));
        let err = orchestrator.run(&deployment(vec![addr])).await.unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[tokio::test]
    async fn empty_deployment_is_ready() {
        let orchestrator = ProbeOrchestrator::new();
        assert!(orchestrator.run(&deployment(Vec::new())).await.is_ok());
    }
}
