//! Job domain types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Every recurring job the timed-task subsystem knows how to run
///
/// The set is closed: configuration keys are checked against it when the
/// config is parsed, so a job without an action cannot reach the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Dispatch collection for every crawler class
    Collector,
    /// Subscription cleanup / decoupling maintenance
    DdtDecouple,
    /// Freshness-ledger sweep over every crawler class
    DdtOverdue,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Collector, JobKind::DdtDecouple, JobKind::DdtOverdue];

    /// Name used for this job in configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Collector => "collector",
            JobKind::DdtDecouple => "ddt_decouple",
            JobKind::DdtOverdue => "ddt_overdue",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling metadata for one job
///
/// Built once when the timed-task subsystem starts; never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub kind: JobKind,
    pub interval: Duration,
    pub enabled: bool,
}

impl JobSpec {
    pub fn new(kind: JobKind, interval_secs: u64, enabled: bool) -> Self {
        Self {
            kind,
            interval: Duration::from_secs(interval_secs),
            enabled,
        }
    }
}
