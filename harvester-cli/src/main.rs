//! Harvester CLI
//!
//! The `harvester` binary: operator commands plus the hidden entry point the
//! supervisor uses to start each subsystem in its own process.

mod commands;

use clap::Parser;
use commands::{Commands, handle_command};
use harvester_core::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Proxy subscription harvester", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./harvester.toml when present)
    #[arg(long, global = true, env = "HARVESTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "harvester=debug,tower_http=debug"
    } else {
        "harvester=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref());
    let debug = cli.command.is_server() && config.as_ref().is_ok_and(|c| c.server.debug);
    init_tracing(debug);

    let config = match config {
        Ok(config) => {
            match Config::source_path(cli.config.as_deref()) {
                Some(path) => tracing::info!("Loaded configuration from {}", path.display()),
                None => tracing::info!("No configuration file found, using defaults"),
            }
            config
        }
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::from(commands::CONFIG_ERROR);
        }
    };

    match handle_command(cli.command, cli.config, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
