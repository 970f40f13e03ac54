//! Simulated hosts for the local cluster.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bootgrid_core::{ConfigError, Resources};

/// One simulated host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalHost {
    pub hostname: String,
    #[serde(default = "default_cpus")]
    pub cpus: f64,
    #[serde(default = "default_mem")]
    pub mem: f64,
    /// Address reported by the host's discovery task. Without one, the
    /// machine's own address is discovered.
    #[serde(default)]
    pub ip: Option<String>,
}

fn default_cpus() -> f64 {
    4.0
}

fn default_mem() -> f64 {
    4096.0
}

impl LocalHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            cpus: default_cpus(),
            mem: default_mem(),
            ip: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn resources(&self) -> Resources {
        Resources::new(self.cpus, self.mem)
    }
}

/// Parses `hostname` or `hostname=ip`.
impl FromStr for LocalHost {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, ip) = match s.split_once('=') {
            Some((name, ip)) => (name.trim(), Some(ip.trim())),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(ConfigError::Invalid(format!("empty hostname in {s:?}")));
        }
        let host = LocalHost::new(name);
        match ip {
            Some("") => Err(ConfigError::Invalid(format!("empty ip in {s:?}"))),
            Some(ip) => Ok(host.with_ip(ip)),
            None => Ok(host),
        }
    }
}

/// Hosts the local cluster offers, and how often declined hosts come back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalClusterConfig {
    pub hosts: Vec<LocalHost>,
    pub offer_interval_ms: u64,
}

impl Default for LocalClusterConfig {
    fn default() -> Self {
        Self {
            hosts: vec![LocalHost::new("localhost")],
            offer_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClusterSection {
    #[serde(default)]
    cluster: LocalClusterConfig,
}

impl LocalClusterConfig {
    pub fn new(hosts: Vec<LocalHost>) -> Self {
        Self {
            hosts,
            ..Default::default()
        }
    }

    pub fn with_offer_interval(mut self, interval: Duration) -> Self {
        self.offer_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Load the `[cluster]` table of a bootgrid.toml file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let section: ClusterSection = toml::from_str(&content)?;
        Ok(section.cluster)
    }

    pub fn offer_interval(&self) -> Duration {
        Duration::from_millis(self.offer_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::Invalid("local cluster needs at least one host".to_string()));
        }
        if self.offer_interval_ms == 0 {
            return Err(ConfigError::Invalid("offer interval must be positive".to_string()));
        }
        Ok(())
    }
}
