//! Task scheduler for housekeeping jobs

use harvester_core::domain::JobSpec;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::run_lane;
use crate::actions::JobAction;

/// Runs every added job on its own cadence
#[derive(Default)]
pub struct TaskScheduler {
    jobs: Vec<(JobSpec, Arc<dyn JobAction>)>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job; disabled specs are ignored
    pub fn add_job(&mut self, spec: JobSpec, action: Arc<dyn JobAction>) {
        if !spec.enabled {
            debug!(job = %spec.kind, "Job disabled, not scheduling");
            return;
        }
        self.jobs.push((spec, action));
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Starts every job lane and runs them for the life of the process
    ///
    /// Returns straight away when no job was added.
    pub async fn deploy_jobs(self) {
        let mut lanes = JoinSet::new();

        for (spec, action) in self.jobs {
            info!(job = %spec.kind, interval = ?spec.interval, "Deploying job");
            lanes.spawn(run_lane(spec.interval, action));
        }

        while let Some(joined) = lanes.join_next().await {
            if let Err(e) = joined {
                error!("Job lane stopped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingAction;
    use harvester_core::domain::JobKind;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_immediately_then_at_their_cadence() {
        let fast = Arc::new(CountingAction::new("ddt_overdue"));
        let slow = Arc::new(CountingAction::new("ddt_decouple"));

        let mut scheduler = TaskScheduler::new();
        scheduler.add_job(JobSpec::new(JobKind::DdtOverdue, 60, true), fast.clone());
        scheduler.add_job(JobSpec::new(JobKind::DdtDecouple, 300, true), slow.clone());
        assert_eq!(scheduler.len(), 2);

        let handle = tokio::spawn(scheduler.deploy_jobs());

        // runs at t=0, 60, 120
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(fast.count(), 3);
        assert_eq!(slow.count(), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_its_lane() {
        let failing = Arc::new(CountingAction::failing("ddt_overdue"));

        let mut scheduler = TaskScheduler::new();
        scheduler.add_job(JobSpec::new(JobKind::DdtOverdue, 60, true), failing.clone());
        let handle = tokio::spawn(scheduler.deploy_jobs());

        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(failing.count(), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_disabled_jobs_are_not_scheduled() {
        let action = Arc::new(CountingAction::new("ddt_decouple"));

        let mut scheduler = TaskScheduler::new();
        scheduler.add_job(JobSpec::new(JobKind::DdtDecouple, 60, false), action.clone());
        assert!(scheduler.is_empty());

        // nothing to run, so deploying returns
        scheduler.deploy_jobs().await;
        assert_eq!(action.count(), 0);
    }
}
