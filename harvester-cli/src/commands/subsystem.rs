//! Subsystem command handler
//!
//! Entry point of the child processes the supervisor starts. Each child runs
//! inside a `subsystem` span so its log lines can be told apart.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use harvester_core::Config;
use harvester_core::domain::Subsystem;
use harvester_ledger::FreshnessLedger;
use harvester_runner::collaborator::run_collaborator;
use harvester_runner::supervisor::shutdown_signal;
use harvester_runner::timed::run_timed_tasks;
use harvester_runner::CommandHooks;
use harvester_server::AppState;
use std::sync::Arc;
use tracing::Instrument;

use super::{current_thread_runtime, multi_thread_runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubsystemName {
    TimedTasks,
    Server,
    Collaborator,
}

impl From<SubsystemName> for Subsystem {
    fn from(name: SubsystemName) -> Self {
        match name {
            SubsystemName::TimedTasks => Subsystem::TimedTasks,
            SubsystemName::Server => Subsystem::Server,
            SubsystemName::Collaborator => Subsystem::Collaborator,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubsystemArgs {
    /// Subsystem to run
    #[arg(value_enum)]
    pub name: SubsystemName,

    /// Server bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Server bind port
    #[arg(long)]
    pub port: Option<u16>,
}

impl SubsystemArgs {
    pub fn is_server(&self) -> bool {
        self.name == SubsystemName::Server
    }
}

pub fn handle_subsystem(args: SubsystemArgs, config: &Config) -> Result<()> {
    let subsystem = Subsystem::from(args.name);
    let span = tracing::info_span!("subsystem", name = %subsystem);

    match subsystem {
        Subsystem::TimedTasks => run_timed(config, span),
        Subsystem::Server => run_server(args, config, span),
        Subsystem::Collaborator => run_collaborate(config, span),
    }
}

fn run_timed(config: &Config, span: tracing::Span) -> Result<()> {
    let ledger = FreshnessLedger::redis(&config.ledger).context("Failed to open the ledger")?;
    let hooks = Arc::new(CommandHooks::new(config.hooks.clone()));

    let runtime = multi_thread_runtime(config.deploy.collector_concurrency.max(2))?;
    runtime.block_on(run_timed_tasks(config, ledger, hooks).instrument(span))?;
    Ok(())
}

fn run_server(args: SubsystemArgs, config: &Config, span: tracing::Span) -> Result<()> {
    let mut server = config.server.clone();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let ledger = FreshnessLedger::redis(&config.ledger).context("Failed to open the ledger")?;
    let state = AppState::new(ledger, config.crawler_sequence.clone());

    let runtime = multi_thread_runtime(server.threads)?;
    runtime
        .block_on(harvester_server::serve(&server, state, shutdown_signal()).instrument(span))
        .with_context(|| format!("Server on {} failed", server.bind_addr()))
}

fn run_collaborate(config: &Config, span: tracing::Span) -> Result<()> {
    let hooks = Arc::new(CommandHooks::new(config.hooks.clone()));

    let runtime = current_thread_runtime()?;
    runtime.block_on(run_collaborator(hooks).instrument(span))?;
    Ok(())
}
