//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration
///
/// Every variant is fatal for the process that hits it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A structurally valid config with an unusable value
    #[error("invalid config: {0}")]
    Invalid(String),

    /// An enabled job has no launch interval
    #[error("launch_interval has no entry for job '{job}'")]
    MissingInterval { job: String },

    /// A launch interval is empty or would fire (almost) continuously
    #[error("launch_interval for '{job}' is empty or not greater than 1 (got {value})")]
    IntervalTooSmall { job: String, value: String },

    /// The collector is the only enabled job
    #[error("the collector job cannot be deployed alone; enable at least one other task")]
    CollectorWithoutSibling,
}

impl ConfigError {
    /// Create an invalid-value error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
