//! bootgrid.toml configuration and deployment toggles read from the
//! environment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Credential;

/// Enables framework checkpointing when set.
pub const ENV_CHECKPOINT: &str = "MESOS_CHECKPOINT";
/// Enables authentication when set; requires principal and secret.
pub const ENV_AUTHENTICATE: &str = "MESOS_AUTHENTICATE";
pub const ENV_PRINCIPAL: &str = "DEFAULT_PRINCIPAL";
pub const ENV_SECRET: &str = "DEFAULT_SECRET";

/// Top-level layout of a bootgrid.toml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub framework: FrameworkConfig,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Everything the scheduler needs to place and hand off a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Cluster manager address.
    pub master: String,
    /// Executable started as executor and, with `-p <port>`, as worker service.
    pub executable: String,
    /// Number of executors (`n_exe`) to deploy.
    pub workers: u32,
    /// Framework name registered with the cluster manager.
    pub name: String,
    /// Worker-group name handed to the orchestrator.
    pub group: String,
    /// Routing prefix handed to the orchestrator.
    pub prefix: String,
    /// CPU shares requested per discovery task.
    pub cpus: f64,
    /// Memory (MB) requested per discovery task.
    pub mem: f64,
    /// Delay before orchestration, letting worker services bind their port.
    pub grace_period_ms: u64,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            master: "127.0.0.1:5050".to_string(),
            executable: "./bootgrid-worker".to_string(),
            workers: 1,
            name: "bootgrid framework".to_string(),
            group: "default".to_string(),
            prefix: "/".to_string(),
            cpus: 1.0,
            mem: 32.0,
            grace_period_ms: 1000,
        }
    }
}

impl FrameworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.executable.is_empty() {
            return Err(ConfigError::Invalid("executable must be set".to_string()));
        }
        if self.cpus <= 0.0 || self.mem <= 0.0 {
            return Err(ConfigError::Invalid(
                "cpus and mem must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deployment toggles taken from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvToggles {
    pub checkpoint: bool,
    pub authenticate: bool,
    pub principal: Option<String>,
    pub secret: Option<String>,
}

impl EnvToggles {
    /// Read toggles from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read toggles through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            checkpoint: get(ENV_CHECKPOINT).is_some(),
            authenticate: get(ENV_AUTHENTICATE).is_some(),
            principal: get(ENV_PRINCIPAL),
            secret: get(ENV_SECRET),
        }
    }

    /// The credential to hand the driver, if authentication is enabled.
    ///
    /// Fails when authentication is on but either value is missing.
    pub fn credential(&self) -> Result<Option<Credential>, ConfigError> {
        if !self.authenticate {
            return Ok(None);
        }
        let principal = self
            .principal
            .clone()
            .ok_or(ConfigError::MissingCredential(ENV_PRINCIPAL))?;
        let secret = self
            .secret
            .clone()
            .ok_or(ConfigError::MissingCredential(ENV_SECRET))?;
        Ok(Some(Credential { principal, secret }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_framework_table() {
        let toml_str = r#"
[framework]
executable = "/opt/bootgrid/worker"
workers = 3
prefix = "/ga"
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.framework.workers, 3);
        assert_eq!(config.framework.prefix, "/ga");
        assert_eq!(config.framework.grace_period_ms, 1000);
        assert!(config.framework.validate().is_ok());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[framework]\nworkers = 5\ncpus = 0.5").unwrap();
        let config = ConfigFile::from_file(file.path()).unwrap();
        assert_eq!(config.framework.workers, 5);
        assert_eq!(config.framework.cpus, 0.5);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ConfigFile::from_file(Path::new("/nonexistent/bootgrid.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn zero_workers_is_invalid() {
        let config = FrameworkConfig {
            workers: 0,
            ..FrameworkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toggles_default_off() {
        let env = EnvToggles::from_lookup(lookup(&[]));
        assert!(!env.checkpoint);
        assert!(!env.authenticate);
        assert_eq!(env.credential().unwrap(), None);
    }

    #[test]
    fn empty_value_counts_as_unset() {
        let env = EnvToggles::from_lookup(lookup(&[(ENV_CHECKPOINT, "")]));
        assert!(!env.checkpoint);
    }

    #[test]
    fn authentication_bundles_credential() {
        let env = EnvToggles::from_lookup(lookup(&[
            (ENV_AUTHENTICATE, "1"),
            (ENV_PRINCIPAL, "ops"),
            (ENV_SECRET, "s3cret"),
        ]));
        let cred = env.credential().unwrap().unwrap();
        assert_eq!(cred.principal, "ops");
        assert_eq!(cred.secret, "s3cret");
    }

    #[test]
    fn authentication_without_secret_fails() {
        let env = EnvToggles::from_lookup(lookup(&[
            (ENV_AUTHENTICATE, "1"),
            (ENV_PRINCIPAL, "ops"),
        ]));
        let err = env.credential().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ENV_SECRET)));
    }

    #[test]
    fn authentication_without_principal_fails() {
        let env = EnvToggles::from_lookup(lookup(&[(ENV_AUTHENTICATE, "yes"), (ENV_SECRET, "x")]));
        assert!(matches!(
            env.credential(),
            Err(ConfigError::MissingCredential(ENV_PRINCIPAL))
        ));
    }
}
