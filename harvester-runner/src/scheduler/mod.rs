//! Scheduling lanes for the timed-task subsystem
//!
//! Housekeeping jobs share the task scheduler, one lane per job. Collection
//! fans out into many sub-tasks and gets its own lane with its own
//! configuration.

mod collector;
mod tasks;

pub use collector::{CollectorLane, CollectorScheduler};
pub use tasks::TaskScheduler;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::actions::JobAction;

/// Runs `action` now and then every `interval`, forever
///
/// A run that overruns its interval swallows the missed ticks instead of
/// firing them back to back. Failed runs are logged and the lane goes on.
pub(crate) async fn run_lane(interval: Duration, action: Arc<dyn JobAction>) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let run_id = Uuid::new_v4();
        debug!(job = action.name(), %run_id, "Running job");

        match action.run().await {
            Ok(()) => debug!(job = action.name(), %run_id, "Job finished"),
            Err(e) => warn!(job = action.name(), %run_id, "Job failed: {:#}", e),
        }
    }
}
