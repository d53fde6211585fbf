//! Job actions
//!
//! The behaviour behind each job kind. Actions are trait objects so the
//! schedulers can run them without knowing what they do.

mod collect;
mod maintenance;

pub use collect::CollectAll;
pub use maintenance::{DecoupleSubscriptions, OverdueSweep};

use async_trait::async_trait;

/// One unit of scheduled work
#[async_trait]
pub trait JobAction: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Runs the job once
    async fn run(&self) -> anyhow::Result<()>;
}
