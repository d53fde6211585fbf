//! Maintenance command handlers
//!
//! One-off runs of the housekeeping jobs the timed-task subsystem schedules.

use anyhow::{Context, Result};
use colored::*;
use harvester_core::Config;
use harvester_ledger::{FreshnessLedger, Remaining};
use harvester_runner::actions::{DecoupleSubscriptions, JobAction, OverdueSweep};
use harvester_runner::CommandHooks;
use std::sync::Arc;

use super::current_thread_runtime;

/// Sweep the ledger once and print the dashboard
pub fn handle_ddt(config: &Config) -> Result<()> {
    let ledger = FreshnessLedger::redis(&config.ledger).context("Failed to open the ledger")?;
    let sweep = OverdueSweep::new(ledger, config.crawler_sequence.clone());

    let runtime = current_thread_runtime()?;
    let dashboard = runtime.block_on(sweep.sweep())?;

    println!(
        "{}",
        format!("Refreshed {} freshness marker(s):", dashboard.len()).bold()
    );
    for (name, remaining) in dashboard.entries() {
        println!("  {} {:<12} {}", "▸".cyan(), name.bold(), colorize(remaining));
    }

    Ok(())
}

/// Run the subscription cleanup routine once
pub fn handle_subs_ddt(config: &Config, debug: bool, power: u32) -> Result<()> {
    let hooks = Arc::new(CommandHooks::new(config.hooks.clone()));
    let action = DecoupleSubscriptions::new(hooks, debug, power);

    let runtime = current_thread_runtime()?;
    runtime.block_on(action.run())?;

    println!("{}", "Subscription cleanup finished.".green());
    Ok(())
}

fn colorize(remaining: &Remaining) -> ColoredString {
    let text = remaining.to_string();
    match remaining {
        Remaining::Renewed { .. } => text.green(),
        Remaining::Fresh { .. } => text.normal(),
    }
}
