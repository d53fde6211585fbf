//! Immediate-run mode
//!
//! One pass of collection over every crawler class, then one ledger sweep.
//! Used when the harvester is started without `--deploy`.

use harvester_core::Config;
use harvester_ledger::{Dashboard, FreshnessLedger};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::hooks::{DispatchOptions, TaskHooks};

/// What one immediate run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Classes collected successfully, in order
    pub collected: Vec<String>,
    /// Classes whose collection failed
    pub failed: Vec<String>,
    /// Outcome of the distribution step, if it ran
    pub distributed: Option<bool>,
    /// Ledger state after the sweep, if the store answered
    pub dashboard: Option<Dashboard>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.distributed != Some(false)
    }
}

/// Collects every crawler class once, in configured order, then sweeps the
/// ledger
///
/// Failures are logged and recorded in the report; the run always reaches
/// the sweep.
pub async fn run_immediate(
    config: &Config,
    ledger: &FreshnessLedger,
    hooks: Arc<dyn TaskHooks>,
    options: DispatchOptions,
) -> RunReport {
    let mut report = RunReport::default();

    for class in &config.crawler_sequence {
        info!(class = %class, "Collecting");
        match hooks.collect(class, options).await {
            Ok(()) => report.collected.push(class.clone()),
            Err(e) => {
                error!(class = %class, "Collection failed: {}", e);
                report.failed.push(class.clone());
            }
        }
    }

    let distribution = (!options.beat_sync).then(|| {
        let hooks = Arc::clone(&hooks);
        tokio::spawn(async move { hooks.distribute().await })
    });

    match ledger.sweep(&config.crawler_sequence).await {
        Ok(dashboard) => report.dashboard = Some(dashboard),
        Err(e) => warn!("Ledger sweep failed: {}", e),
    }

    if let Some(handle) = distribution {
        let ok = match handle.await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("Distribution failed: {}", e);
                false
            }
            Err(e) => {
                error!("Distribution task panicked: {}", e);
                false
            }
        };
        report.distributed = Some(ok);
    }

    info!(
        collected = report.collected.len(),
        failed = report.failed.len(),
        "Immediate run complete"
    );
    report
}
