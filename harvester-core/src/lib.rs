//! Harvester Core
//!
//! Core types shared by every harvester process.
//!
//! This crate contains:
//! - Configuration: the immutable settings struct read once at process entry
//! - Domain types: job kinds, job specs and supervised subsystems
//! - Interval policy: validation and correction of job launch intervals

pub mod config;
pub mod domain;
pub mod error;
pub mod interval;

pub use config::Config;
pub use error::ConfigError;
pub use interval::{IntervalTable, RawInterval};
