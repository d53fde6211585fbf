//! Start command handler
//!
//! With `--deploy` the enabled subsystems are started under the process
//! supervisor. Without it one immediate collection pass runs in this process.

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args};
use colored::*;
use harvester_core::Config;
use harvester_core::domain::Subsystem;
use harvester_ledger::FreshnessLedger;
use harvester_runner::supervisor::{SelfExecLauncher, shutdown_signal};
use harvester_runner::{CommandHooks, DispatchOptions, ProcessSupervisor, run_immediate};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::current_thread_runtime;

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Deploy the subsystems instead of running once
    #[arg(long)]
    pub deploy: bool,

    /// Dispatch collection without the synchronized pass
    #[arg(long)]
    pub no_beat_sync: bool,

    /// Collect even crawler classes that are still fresh
    #[arg(long)]
    pub force_run: bool,

    /// Run the timed-task subsystem [default: deploy.global]
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    pub timed_task: Option<bool>,

    /// Run the server subsystem [default: server.enabled]
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    pub server: Option<bool>,

    /// Run the collaborative-sync subsystem [default: deploy.collaborator]
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    pub collaborator: Option<bool>,

    /// Server bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Server bind port
    #[arg(long)]
    pub port: Option<u16>,
}

impl StartArgs {
    /// Subsystems to deploy, flags taking precedence over the config
    pub fn subsystems(&self, config: &Config) -> Vec<Subsystem> {
        Subsystem::enabled(
            self.timed_task.unwrap_or(config.deploy.global),
            self.server.unwrap_or(config.server.enabled),
            self.collaborator.unwrap_or(config.deploy.collaborator),
        )
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            beat_sync: !self.no_beat_sync,
            force_run: self.force_run,
        }
    }
}

pub fn handle_start(args: StartArgs, config_path: Option<PathBuf>, config: &Config) -> Result<()> {
    if args.deploy {
        deploy(args, config_path, config)
    } else {
        run_once(&args, config)
    }
}

fn deploy(args: StartArgs, config_path: Option<PathBuf>, config: &Config) -> Result<()> {
    let subsystems = args.subsystems(config);
    if subsystems.is_empty() {
        warn!("No subsystem enabled, nothing to deploy");
        return Ok(());
    }

    let launcher = SelfExecLauncher::new(config_path)
        .context("Failed to locate the harvester executable")?
        .with_server_overrides(args.host, args.port);
    let supervisor = ProcessSupervisor::new(
        Arc::new(launcher),
        config.supervisor.restart_policy,
        config.supervisor.termination_grace(),
    );

    let names: Vec<&str> = subsystems.iter().map(|s| s.as_str()).collect();
    info!("Deploying subsystems: {}", names.join(", "));

    let runtime = current_thread_runtime()?;
    let report = runtime.block_on(supervisor.run(&subsystems, shutdown_signal()));

    for child in &report.children {
        let exit = if child.exit.is_failure() {
            child.exit.to_string().red()
        } else {
            child.exit.to_string().green()
        };
        println!(
            "  {} {:<13} {} (restarts: {})",
            "▸".cyan(),
            child.subsystem.as_str().bold(),
            exit,
            child.restarts
        );
    }

    if !report.is_success() {
        bail!("Supervisor run {}", report.outcome);
    }
    Ok(())
}

fn run_once(args: &StartArgs, config: &Config) -> Result<()> {
    let ledger = FreshnessLedger::redis(&config.ledger).context("Failed to open the ledger")?;
    let hooks = Arc::new(CommandHooks::new(config.hooks.clone()));

    let runtime = current_thread_runtime()?;
    let report = runtime.block_on(run_immediate(
        config,
        &ledger,
        hooks,
        args.dispatch_options(),
    ));

    if let Some(dashboard) = &report.dashboard {
        println!("{} {}", "Ledger:".bold(), dashboard);
    }

    if !report.is_success() {
        bail!(
            "Immediate run finished with failures (collection failed for: [{}], distributed: {:?})",
            report.failed.join(", "),
            report.distributed
        );
    }
    Ok(())
}
