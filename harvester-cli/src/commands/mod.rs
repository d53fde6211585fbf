//! Commands module
//!
//! Defines all CLI commands and their handlers. Every handler builds the
//! tokio runtime it needs, so the server child can size its own worker pool.

mod check;
mod maintenance;
mod start;
mod subsystem;

pub use start::StartArgs;
pub use subsystem::SubsystemArgs;

use anyhow::Result;
use clap::{ArgAction, Subcommand};
use harvester_core::{Config, ConfigError};
use harvester_runner::TimedTaskError;
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Exit code of a runtime failure
pub const RUNTIME_ERROR: u8 = 1;
/// Exit code of a configuration error
pub const CONFIG_ERROR: u8 = 2;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the subsystems, or run one immediate collection pass
    Start(StartArgs),
    /// Refresh the freshness markers once and print them
    Ddt,
    /// Run the subscription cleanup routine once
    SubsDdt {
        /// Run the routine in debug mode; `--debug false` turns it off
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        debug: bool,
        /// Work units handed to the routine
        #[arg(long, default_value_t = 12)]
        power: u32,
    },
    /// Validate the configuration and print the job table
    CheckConfig,
    /// Child process entry point used by the supervisor
    #[command(hide = true)]
    Subsystem(SubsystemArgs),
}

impl Commands {
    /// Whether this command runs the HTTP server subsystem
    pub fn is_server(&self) -> bool {
        matches!(self, Commands::Subsystem(args) if args.is_server())
    }
}

/// Handle a CLI command
///
/// `config_path` is forwarded to child processes so they read the same file.
pub fn handle_command(command: Commands, config_path: Option<PathBuf>, config: Config) -> Result<()> {
    match command {
        Commands::Start(args) => start::handle_start(args, config_path, &config),
        Commands::Ddt => maintenance::handle_ddt(&config),
        Commands::SubsDdt { debug, power } => maintenance::handle_subs_ddt(&config, debug, power),
        Commands::CheckConfig => check::handle_check(&config),
        Commands::Subsystem(args) => subsystem::handle_subsystem(args, &config),
    }
}

/// Exit code for a failed command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<TimedTaskError>() {
        return e.exit_code();
    }
    if err.chain().any(|cause| cause.is::<ConfigError>()) {
        return CONFIG_ERROR;
    }
    RUNTIME_ERROR
}

/// Runtime for commands that mostly wait on I/O or children
fn current_thread_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Runtime with `workers` worker threads
fn multi_thread_runtime(workers: usize) -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.max(1))
        .enable_all()
        .build()?)
}
