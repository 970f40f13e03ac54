//! Local mode: runs a whole deployment in this process.
//!
//! The scheduler, the simulated cluster manager and one executor agent per
//! configured host share a tokio runtime. Worker services are real child
//! processes; the run ends once every worker is reachable (exit 0) or the
//! deployment fails (exit 1).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use bootgrid_core::{ConfigFile, EnvToggles, FrameworkConfig};
use bootgrid_local::{LocalClusterConfig, LocalClusterFactory, LocalHost};
use bootgrid_scheduler::{ProbeOrchestrator, start_framework, stop_framework};

#[derive(Debug, Args)]
pub struct LocalArgs {
    /// bootgrid.toml with `[framework]` and `[cluster]` tables.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Cluster manager address recorded for the framework.
    #[arg(long)]
    pub master: Option<String>,

    /// Executable started as executor and worker service.
    #[arg(long)]
    pub executable: Option<String>,

    /// Number of executors to deploy.
    #[arg(long)]
    pub workers: Option<u32>,

    /// Simulated host, `NAME` or `NAME=IP`. Repeatable; replaces the
    /// configured hosts.
    #[arg(long = "host", value_name = "NAME[=IP]")]
    pub hosts: Vec<LocalHost>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub group: Option<String>,

    #[arg(long)]
    pub prefix: Option<String>,

    /// CPU shares per discovery task.
    #[arg(long)]
    pub cpus: Option<f64>,

    /// Memory (MB) per discovery task.
    #[arg(long)]
    pub mem: Option<f64>,

    /// Delay before orchestration, in milliseconds.
    #[arg(long = "grace-ms")]
    pub grace_ms: Option<u64>,

    /// How often declined hosts are offered again, in milliseconds.
    #[arg(long)]
    pub offer_interval_ms: Option<u64>,

    /// Connection attempts per worker before the deployment fails.
    #[arg(long, default_value = "10")]
    pub probe_attempts: u32,

    /// Delay between connection attempts, in milliseconds.
    #[arg(long, default_value = "500")]
    pub probe_interval_ms: u64,
}

impl LocalArgs {
    /// File values (or defaults), overridden by whatever was given on the
    /// command line.
    pub fn resolve(&self) -> anyhow::Result<(FrameworkConfig, LocalClusterConfig)> {
        let (mut framework, mut cluster) = match &self.config {
            Some(path) => {
                let file = ConfigFile::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                let cluster = LocalClusterConfig::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                (file.framework, cluster)
            }
            None => (FrameworkConfig::default(), LocalClusterConfig::default()),
        };

        override_with(&mut framework.master, &self.master);
        override_with(&mut framework.executable, &self.executable);
        override_with(&mut framework.workers, &self.workers);
        override_with(&mut framework.name, &self.name);
        override_with(&mut framework.group, &self.group);
        override_with(&mut framework.prefix, &self.prefix);
        override_with(&mut framework.cpus, &self.cpus);
        override_with(&mut framework.mem, &self.mem);
        override_with(&mut framework.grace_period_ms, &self.grace_ms);
        override_with(&mut cluster.offer_interval_ms, &self.offer_interval_ms);
        if !self.hosts.is_empty() {
            cluster.hosts = self.hosts.clone();
        }

        Ok((framework, cluster))
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Run the deployment and return the process exit status.
pub async fn run_local(args: LocalArgs) -> anyhow::Result<i32> {
    let (framework, cluster) = args.resolve()?;
    info!(
        workers = framework.workers,
        hosts = cluster.hosts.len(),
        executable = %framework.executable,
        "bootgridd starting in local mode"
    );

    let orchestrator = Arc::new(
        ProbeOrchestrator::new()
            .with_attempts(args.probe_attempts)
            .with_interval(Duration::from_millis(args.probe_interval_ms)),
    );
    let factory = LocalClusterFactory::new(cluster);
    let mut driver = start_framework(&framework, &EnvToggles::from_env(), orchestrator, factory)
        .context("failed to start framework")?;

    Ok(stop_framework(&mut driver).await)
}
