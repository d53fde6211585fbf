//! Timed-task subsystem
//!
//! Builds the job lanes from configuration and runs them until the process
//! is terminated. Housekeeping jobs go to the task scheduler, collection to
//! its own lane.

use harvester_core::Config;
use harvester_core::ConfigError;
use harvester_core::domain::{JobKind, JobSpec};
use harvester_core::interval;
use harvester_ledger::{FreshnessLedger, LedgerError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::hooks::{Hook, TaskHooks};
use crate::registry::JobRegistry;
use crate::scheduler::{CollectorLane, CollectorScheduler, TaskScheduler};

#[derive(Debug, Error)]
pub enum TimedTaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("freshness ledger is unavailable")]
    LedgerUnavailable(#[source] LedgerError),

    #[error("job {job} needs hooks.{hook}, which is not configured")]
    MissingHook { job: JobKind, hook: Hook },
}

impl TimedTaskError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            TimedTaskError::LedgerUnavailable(_) => 1,
            TimedTaskError::Config(_) | TimedTaskError::MissingHook { .. } => 2,
        }
    }
}

/// The hook a job kind cannot run without
fn required_hook(kind: JobKind) -> Option<Hook> {
    match kind {
        JobKind::Collector => Some(Hook::Collect),
        JobKind::DdtDecouple => Some(Hook::Decouple),
        JobKind::DdtOverdue => None,
    }
}

/// Both scheduling lanes, ready to run
pub struct TimedTasks {
    tasks: TaskScheduler,
    collector: CollectorScheduler,
}

impl TimedTasks {
    /// Validates the deployment and builds the lanes
    ///
    /// Fails before anything is scheduled when the ledger cannot be reached,
    /// an interval is unusable, the collector would run alone or an enabled
    /// job lacks its hook.
    pub async fn prepare(
        config: &Config,
        ledger: FreshnessLedger,
        hooks: Arc<dyn TaskHooks>,
    ) -> Result<Self, TimedTaskError> {
        let flags = config.deploy.tasks;
        info!(
            global = config.deploy.global,
            collector = flags.collector,
            ddt_decouple = flags.ddt_decouple,
            ddt_overdue = flags.ddt_overdue,
            "Deploy flags"
        );

        if let Err(e) = ledger.ping().await {
            warn!("<RedisIO> Network communication failure, please check the network connection.");
            return Err(TimedTaskError::LedgerUnavailable(e));
        }

        let intervals = interval::normalize(&config.launch_interval)?;
        flags.check_collector_siblings()?;

        for kind in flags.enabled() {
            if let Some(hook) = required_hook(kind)
                && !hooks.is_configured(hook)
            {
                return Err(TimedTaskError::MissingHook { job: kind, hook });
            }
        }

        let registry = JobRegistry::new(config, ledger, hooks);
        let mut tasks = TaskScheduler::new();
        let mut collector = CollectorScheduler::new(registry.action(JobKind::Collector));

        for kind in JobKind::ALL {
            let enabled = flags.is_enabled(kind);
            let secs = match intervals.get(kind.as_str()) {
                Some(secs) => secs,
                None if enabled => intervals.seconds_for(kind)?,
                None => continue,
            };

            info!("[Job] {} -- interval: {}s -- run: {}", kind, secs, enabled);

            let spec = JobSpec::new(kind, secs, enabled);
            match kind {
                JobKind::Collector => collector.mapping_config(CollectorLane {
                    interval: spec.interval,
                    permission: spec.enabled,
                }),
                _ => tasks.add_job(spec, registry.action(kind)),
            }
        }

        Ok(Self { tasks, collector })
    }

    /// Number of jobs that will actually run
    pub fn job_count(&self) -> usize {
        self.tasks.len() + usize::from(self.collector.is_deployed())
    }

    /// Runs both lanes side by side for the life of the process
    pub async fn run(self) {
        tokio::join!(self.tasks.deploy_jobs(), self.collector.deploy_jobs());
    }
}

/// Entry point of the timed-task child process
pub async fn run_timed_tasks(
    config: &Config,
    ledger: FreshnessLedger,
    hooks: Arc<dyn TaskHooks>,
) -> Result<(), TimedTaskError> {
    let timed = TimedTasks::prepare(config, ledger, hooks).await?;
    info!("Timed tasks deployed: {} job(s)", timed.job_count());
    timed.run().await;
    Ok(())
}
