//! Maintenance actions: ledger sweep and subscription cleanup

use anyhow::{Context, Result};
use async_trait::async_trait;
use harvester_ledger::{Dashboard, FreshnessLedger};
use std::sync::Arc;
use tracing::{info, warn};

use super::JobAction;
use crate::hooks::TaskHooks;

/// Refreshes the freshness marker of every crawler class
pub struct OverdueSweep {
    ledger: FreshnessLedger,
    classes: Vec<String>,
}

impl OverdueSweep {
    pub fn new(ledger: FreshnessLedger, classes: Vec<String>) -> Self {
        Self { ledger, classes }
    }

    /// Runs one sweep and returns what the store reported
    pub async fn sweep(&self) -> Result<Dashboard> {
        match self.ledger.sweep(&self.classes).await {
            Ok(dashboard) => Ok(dashboard),
            Err(e) => {
                if e.is_unreachable() {
                    warn!("<RedisIO> Network communication failure, please check the network connection.");
                }
                Err(e).context("Ledger sweep failed")
            }
        }
    }
}

#[async_trait]
impl JobAction for OverdueSweep {
    fn name(&self) -> &str {
        "ddt_overdue"
    }

    async fn run(&self) -> Result<()> {
        let dashboard = self.sweep().await?;
        info!("Refreshed {} freshness marker(s)", dashboard.len());
        Ok(())
    }
}

/// Runs the external subscription cleanup routine
pub struct DecoupleSubscriptions {
    hooks: Arc<dyn TaskHooks>,
    debug: bool,
    power: u32,
}

impl DecoupleSubscriptions {
    pub fn new(hooks: Arc<dyn TaskHooks>, debug: bool, power: u32) -> Self {
        Self { hooks, debug, power }
    }
}

#[async_trait]
impl JobAction for DecoupleSubscriptions {
    fn name(&self) -> &str {
        "ddt_decouple"
    }

    async fn run(&self) -> Result<()> {
        self.hooks
            .decouple(self.debug, self.power)
            .await
            .context("Subscription cleanup failed")
    }
}
