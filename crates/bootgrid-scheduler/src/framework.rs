//! Framework bootstrap: build descriptors, read deployment toggles, hand
//! the scheduler to a driver, and turn the driver's outcome into an exit
//! status.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use bootgrid_core::{
    ConfigError, Credential, DriverHandle, EnvToggles, ExecutorDescriptor, ExecutorId,
    FrameworkConfig, FrameworkDescriptor,
};

use crate::error::SchedulerResult;
use crate::orchestrator::Orchestrator;
use crate::scheduler::SchedulerCore;

pub const EXECUTOR_NAME: &str = "bootgrid executor";
pub const EXECUTOR_SOURCE: &str = "per-job build";

/// Builds the driver that connects a scheduler to a cluster manager.
pub trait DriverFactory {
    type Driver: DriverHandle;

    fn create(
        self,
        scheduler: SchedulerCore,
        framework: FrameworkDescriptor,
        master: &str,
        credential: Option<Credential>,
    ) -> Self::Driver;
}

/// Executor descriptor with a fresh id and the absolute executable path.
pub fn executor_descriptor(executable: &str) -> SchedulerResult<ExecutorDescriptor> {
    let command = std::path::absolute(executable).map_err(|e| {
        ConfigError::Invalid(format!("cannot resolve executable {executable}: {e}"))
    })?;
    Ok(ExecutorDescriptor {
        executor_id: ExecutorId::new(Uuid::new_v4().simple().to_string()),
        command: command.display().to_string(),
        name: EXECUTOR_NAME.to_string(),
        source: EXECUTOR_SOURCE.to_string(),
    })
}

/// Framework descriptor; the user is left empty for the cluster manager to fill.
pub fn framework_descriptor(config: &FrameworkConfig, env: &EnvToggles) -> FrameworkDescriptor {
    if env.checkpoint {
        info!("enabling checkpoint for the framework");
    }
    FrameworkDescriptor {
        name: config.name.clone(),
        user: String::new(),
        checkpoint: env.checkpoint,
    }
}

/// Build the scheduler and its driver.
///
/// Fails before anything is registered when the configuration is invalid
/// or authentication is enabled without both credential values.
pub fn start_framework<F: DriverFactory>(
    config: &FrameworkConfig,
    env: &EnvToggles,
    orchestrator: Arc<dyn Orchestrator>,
    factory: F,
) -> SchedulerResult<F::Driver> {
    config.validate()?;

    if env.authenticate {
        info!("enabling authentication for the framework");
    }
    let credential = env.credential().inspect_err(|e| {
        warn!(error = %e, "expecting authentication credentials in the environment");
    })?;

    let executor = executor_descriptor(&config.executable)?;
    let framework = framework_descriptor(config, env);
    info!(
        executor_id = %executor.executor_id,
        command = %executor.command,
        workers = config.workers,
        master = %config.master,
        "starting framework"
    );

    let scheduler = SchedulerCore::new(config, executor, orchestrator);
    Ok(factory.create(scheduler, framework, &config.master, credential))
}

/// Run the driver to completion and return the process exit status.
///
/// 0 when the driver reports a clean stop, 1 otherwise.
pub async fn stop_framework<D: DriverHandle>(driver: &mut D) -> i32 {
    let status = driver.run().await;
    driver.stop();
    info!(?status, "framework driver finished");
    status.exit_code()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bootgrid_core::DriverStatus;
    use bootgrid_core::config::{ENV_AUTHENTICATE, ENV_CHECKPOINT, ENV_PRINCIPAL, ENV_SECRET};

    use super::*;
    use crate::error::SchedulerError;
    use crate::testing::{RecordingOrchestrator, config};

    struct FakeDriver {
        scheduler: SchedulerCore,
        framework: FrameworkDescriptor,
        master: String,
        credential: Option<Credential>,
        outcome: DriverStatus,
        stops: std::sync::atomic::AtomicU32,
    }

    impl DriverHandle for FakeDriver {
        async fn run(&mut self) -> DriverStatus {
            self.outcome
        }

        fn stop(&self) {
            self.stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct FakeFactory;

    impl DriverFactory for FakeFactory {
        type Driver = FakeDriver;

        fn create(
            self,
            scheduler: SchedulerCore,
            framework: FrameworkDescriptor,
            master: &str,
            credential: Option<Credential>,
        ) -> FakeDriver {
            FakeDriver {
                scheduler,
                framework,
                master: master.to_string(),
                credential,
                outcome: DriverStatus::Stopped,
                stops: Default::default(),
            }
        }
    }

    fn env(vars: &[(&str, &str)]) -> EnvToggles {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        EnvToggles::from_lookup(|k| map.get(k).map(|v| v.to_string()))
    }

    fn orchestrator() -> Arc<dyn Orchestrator> {
        Arc::new(RecordingOrchestrator::default())
    }

    #[test]
    fn executor_descriptor_uses_absolute_path() {
        let exe = executor_descriptor("bin/worker").unwrap();
        assert!(std::path::Path::new(&exe.command).is_absolute());
        assert!(exe.command.ends_with("worker"));
        assert_eq!(exe.name, EXECUTOR_NAME);
        assert_eq!(exe.source, EXECUTOR_SOURCE);
        assert_eq!(exe.executor_id.as_str().len(), 32);
    }

    #[test]
    fn executor_ids_are_unique() {
        let a = executor_descriptor("/bin/worker").unwrap();
        let b = executor_descriptor("/bin/worker").unwrap();
        assert_ne!(a.executor_id, b.executor_id);
    }

    #[test]
    fn plain_start_has_no_credential() {
        let driver = start_framework(&config(3), &env(&[]), orchestrator(), FakeFactory).unwrap();
        assert!(driver.credential.is_none());
        assert!(driver.framework.user.is_empty());
        assert!(!driver.framework.checkpoint);
        assert_eq!(driver.master, "127.0.0.1:5050");
        assert_eq!(driver.scheduler.workers(), 3);
    }

    #[test]
    fn checkpoint_toggle_marks_framework() {
        let driver = start_framework(
            &config(1),
            &env(&[(ENV_CHECKPOINT, "1")]),
            orchestrator(),
            FakeFactory,
        )
        .unwrap();
        assert!(driver.framework.checkpoint);
    }

    #[test]
    fn authentication_passes_credential_to_driver() {
        let vars = [(ENV_AUTHENTICATE, "1"), (ENV_PRINCIPAL, "ops"), (ENV_SECRET, "pw")];
        let driver = start_framework(&config(1), &env(&vars), orchestrator(), FakeFactory).unwrap();
        let cred = driver.credential.unwrap();
        assert_eq!(cred.principal, "ops");
        assert_eq!(cred.secret, "pw");
    }

    #[test]
    fn authentication_without_credentials_is_fatal() {
        let result = start_framework(
            &config(1),
            &env(&[(ENV_AUTHENTICATE, "1")]),
            orchestrator(),
            FakeFactory,
        );
        let err = result.err().unwrap();
        assert!(matches!(err, SchedulerError::Config(ConfigError::MissingCredential(_))));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn stop_framework_maps_status_to_exit_code() {
        let mut driver = start_framework(&config(1), &env(&[]), orchestrator(), FakeFactory).unwrap();
        assert_eq!(stop_framework(&mut driver).await, 0);
        assert_eq!(driver.stops.load(std::sync::atomic::Ordering::SeqCst), 1);

        driver.outcome = DriverStatus::Aborted;
        assert_eq!(stop_framework(&mut driver).await, 1);
    }
}
