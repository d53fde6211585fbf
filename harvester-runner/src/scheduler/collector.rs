//! Collector lane

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::run_lane;
use crate::actions::JobAction;

/// Collector lane configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorLane {
    pub interval: Duration,
    pub permission: bool,
}

/// Schedules collection dispatch separately from housekeeping jobs
pub struct CollectorScheduler {
    action: Arc<dyn JobAction>,
    lane: Option<CollectorLane>,
}

impl CollectorScheduler {
    pub fn new(action: Arc<dyn JobAction>) -> Self {
        Self { action, lane: None }
    }

    pub fn mapping_config(&mut self, lane: CollectorLane) {
        self.lane = Some(lane);
    }

    /// Whether deploying will actually run collection
    pub fn is_deployed(&self) -> bool {
        self.lane.is_some_and(|lane| lane.permission)
    }

    /// Runs the collector lane for the life of the process
    ///
    /// Returns straight away when the lane is unconfigured or not permitted.
    pub async fn deploy_jobs(self) {
        match self.lane {
            Some(lane) if lane.permission => {
                info!(interval = ?lane.interval, "Deploying collector lane");
                run_lane(lane.interval, self.action).await;
            }
            _ => debug!("Collector lane not permitted on this node"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingAction;

    #[tokio::test]
    async fn test_lane_without_permission_returns() {
        let action = Arc::new(CountingAction::new("collector"));
        let mut scheduler = CollectorScheduler::new(action.clone());
        scheduler.mapping_config(CollectorLane {
            interval: Duration::from_secs(60),
            permission: false,
        });

        assert!(!scheduler.is_deployed());
        scheduler.deploy_jobs().await;
        assert_eq!(action.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_collection_skips_ticks() {
        // each run takes 150s on a 60s cadence
        let action = Arc::new(CountingAction::slow("collector", Duration::from_secs(150)));
        let mut scheduler = CollectorScheduler::new(action.clone());
        scheduler.mapping_config(CollectorLane {
            interval: Duration::from_secs(60),
            permission: true,
        });
        assert!(scheduler.is_deployed());

        let handle = tokio::spawn(scheduler.deploy_jobs());

        // runs start at t=0 and t=180, never back to back at t=150
        tokio::time::sleep(Duration::from_secs(170)).await;
        assert_eq!(action.count(), 1);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(action.count(), 2);

        handle.abort();
    }
}
