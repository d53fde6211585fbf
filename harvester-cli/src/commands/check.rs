//! Check-config command handler

use anyhow::Result;
use colored::*;
use harvester_core::Config;
use harvester_core::domain::JobKind;
use harvester_core::interval;

/// Validate the configuration and print the job table
///
/// Loading already validated the file; this also normalizes the launch
/// intervals and checks the collector deployment rule.
pub fn handle_check(config: &Config) -> Result<()> {
    let intervals = interval::normalize(&config.launch_interval)?;
    let flags = config.deploy.tasks;

    println!("{}", "Crawler classes:".bold());
    println!("  {}", config.crawler_sequence.join(", "));
    println!();

    println!("{}", "Jobs:".bold());
    for kind in JobKind::ALL {
        let enabled = flags.is_enabled(kind);
        let interval = match intervals.get(kind.as_str()) {
            Some(secs) => format!("{}s", secs),
            None if enabled => "missing".red().to_string(),
            None => "-".dimmed().to_string(),
        };
        let run = if enabled { "on".green() } else { "off".dimmed() };
        println!("  {} {:<14} {:>8}  {}", "▸".cyan(), kind.as_str().bold(), interval, run);
    }
    println!();

    for kind in flags.enabled() {
        intervals.seconds_for(kind)?;
    }

    match flags.check_collector_siblings() {
        Ok(()) => println!("{}", "Configuration OK.".green()),
        Err(e) => {
            println!("{} {}", "Collector check failed:".red(), e);
            return Err(e.into());
        }
    }

    Ok(())
}
