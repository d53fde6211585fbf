//! Harvester configuration
//!
//! Read once at process entry and passed explicitly to every component.
//! Changes to the file require a restart; nothing here is reloaded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::domain::{JobKind, RestartPolicy};
use crate::error::ConfigError;
use crate::interval::RawInterval;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "harvester.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Crawler classes, in the order they are dispatched
    pub crawler_sequence: Vec<String>,

    /// Which subsystems and jobs are deployed
    pub deploy: DeployConfig,

    /// Seconds between runs of each job, as written by the operator
    pub launch_interval: BTreeMap<String, RawInterval>,

    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub hooks: HookConfig,
    pub maintenance: MaintenanceConfig,
    pub supervisor: SupervisorConfig,
}

/// Deployment switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Global switch for the timed-task subsystem
    pub global: bool,

    /// Run the collaborative-sync subsystem
    pub collaborator: bool,

    /// Per-job switches
    pub tasks: TaskFlags,

    /// Crawler classes the collector lane dispatches at the same time
    pub collector_concurrency: usize,
}

/// Per-job enable flags
///
/// Unknown keys are rejected at parse time, so every configured job has an
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskFlags {
    pub collector: bool,
    pub ddt_decouple: bool,
    pub ddt_overdue: bool,
}

impl TaskFlags {
    pub fn is_enabled(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::Collector => self.collector,
            JobKind::DdtDecouple => self.ddt_decouple,
            JobKind::DdtOverdue => self.ddt_overdue,
        }
    }

    /// Enabled jobs, in declaration order
    pub fn enabled(&self) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// The collector must never be the only deployed job
    pub fn check_collector_siblings(&self) -> Result<(), ConfigError> {
        let siblings = JobKind::ALL
            .into_iter()
            .filter(|kind| *kind != JobKind::Collector)
            .any(|kind| self.is_enabled(kind));

        if self.collector && !siblings {
            return Err(ConfigError::CollectorWithoutSibling);
        }
        Ok(())
    }
}

impl Default for TaskFlags {
    fn default() -> Self {
        Self {
            collector: true,
            ddt_decouple: true,
            ddt_overdue: true,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            global: true,
            collaborator: false,
            tasks: TaskFlags::default(),
            collector_concurrency: 1,
        }
    }
}

/// HTTP server subsystem settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Worker threads of the server process runtime
    pub threads: usize,
    pub debug: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 6500,
            threads: 4,
            debug: false,
        }
    }
}

/// Remote freshness ledger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub redis_url: String,

    /// Key template; `{}` is replaced by the crawler or job name
    pub key_template: String,

    /// Staleness threshold passed on every refresh, in threshold units
    pub cross_threshold: u32,

    /// Length of one threshold unit, in seconds
    pub threshold_unit_secs: u64,
}

impl LedgerConfig {
    /// Marker expiry for `threshold` units, in seconds
    ///
    /// `None` when the product overflows or exceeds [`MAX_MARKER_WINDOW_SECS`].
    pub fn window_secs(&self, threshold: u32) -> Option<u64> {
        marker_window_secs(self.threshold_unit_secs, threshold)
    }
}

/// Longest marker expiry the ledger will ask the store for (one year)
pub const MAX_MARKER_WINDOW_SECS: u64 = 365 * 24 * 3600;

/// `unit_secs × threshold`, if it is a usable expiry
pub fn marker_window_secs(unit_secs: u64, threshold: u32) -> Option<u64> {
    unit_secs
        .checked_mul(u64::from(threshold))
        .filter(|secs| *secs <= MAX_MARKER_WINDOW_SECS)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            key_template: "harvester:freshness:{}".to_string(),
            cross_threshold: 3,
            threshold_unit_secs: 3600,
        }
    }
}

/// External commands standing in for the opaque job bodies
///
/// Each hook is an argv list. `{class}`, `{beat_sync}`, `{force_run}`,
/// `{debug}` and `{power}` are substituted per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    pub collect: Option<Vec<String>>,
    pub decouple: Option<Vec<String>>,
    pub distribute: Option<Vec<String>>,
    pub collaborate: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Work units handed to the scheduled decouple routine
    pub decouple_power: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { decouple_power: 12 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    pub restart_policy: RestartPolicy,

    /// How long a child gets to exit after SIGTERM before it is killed
    pub termination_grace_secs: u64,
}

impl SupervisorConfig {
    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.termination_grace_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_policy: RestartPolicy::Never,
            termination_grace_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let launch_interval = [
            (JobKind::Collector, 300),
            (JobKind::DdtDecouple, 900),
            (JobKind::DdtOverdue, 300),
        ]
        .into_iter()
        .map(|(kind, secs)| (kind.as_str().to_string(), RawInterval::Integer(secs)))
        .collect();

        Self {
            crawler_sequence: vec!["v2ray".to_string(), "ssr".to_string(), "trojan".to_string()],
            deploy: DeployConfig::default(),
            launch_interval,
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            hooks: HookConfig::default(),
            maintenance: MaintenanceConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Config {
    /// File `load` reads for an optional explicit path
    ///
    /// With no explicit path, `harvester.toml` in the working directory is
    /// used when it exists; `None` means the built-in defaults apply.
    pub fn source_path(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        }
    }

    /// Loads, overrides and validates the configuration
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::source_path(path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration file without validating it
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies environment variable overrides
    ///
    /// Recognised variables:
    /// - HARVESTER_REDIS_URL
    /// - HARVESTER_SERVER_HOST
    /// - HARVESTER_SERVER_PORT
    /// - HARVESTER_CRAWLER_SEQUENCE (comma separated)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HARVESTER_REDIS_URL") {
            debug!("Overriding ledger.redis_url from environment");
            self.ledger.redis_url = url;
        }

        if let Ok(host) = std::env::var("HARVESTER_SERVER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = std::env::var("HARVESTER_SERVER_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        if let Ok(sequence) = std::env::var("HARVESTER_CRAWLER_SEQUENCE") {
            self.crawler_sequence = sequence
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Validates everything that does not depend on which subsystem runs
    ///
    /// Launch intervals are checked separately by the interval policy when
    /// the timed-task subsystem starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawler_sequence.is_empty() {
            return Err(ConfigError::invalid("crawler_sequence cannot be empty"));
        }

        let mut seen = HashSet::new();
        for class in &self.crawler_sequence {
            if class.trim().is_empty() {
                return Err(ConfigError::invalid("crawler_sequence contains an empty name"));
            }
            if !seen.insert(class.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "crawler_sequence lists '{}' more than once",
                    class
                )));
            }
        }

        if self.deploy.collector_concurrency == 0 {
            return Err(ConfigError::invalid(
                "deploy.collector_concurrency must be greater than 0",
            ));
        }

        if !self.ledger.redis_url.starts_with("redis://")
            && !self.ledger.redis_url.starts_with("rediss://")
            && !self.ledger.redis_url.starts_with("unix://")
        {
            return Err(ConfigError::invalid(
                "ledger.redis_url must start with redis://, rediss:// or unix://",
            ));
        }

        if !self.ledger.key_template.contains("{}") {
            return Err(ConfigError::invalid(
                "ledger.key_template must contain a {} placeholder",
            ));
        }

        if self.ledger.cross_threshold == 0 || self.ledger.threshold_unit_secs == 0 {
            return Err(ConfigError::invalid(
                "ledger.cross_threshold and ledger.threshold_unit_secs must be greater than 0",
            ));
        }

        if self.ledger.window_secs(self.ledger.cross_threshold).is_none() {
            return Err(ConfigError::invalid(format!(
                "ledger.cross_threshold x ledger.threshold_unit_secs must not exceed {} seconds",
                MAX_MARKER_WINDOW_SECS
            )));
        }

        if self.server.threads == 0 {
            return Err(ConfigError::invalid("server.threads must be greater than 0"));
        }

        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port must be greater than 0"));
        }

        for (name, hook) in [
            ("collect", &self.hooks.collect),
            ("decouple", &self.hooks.decouple),
            ("distribute", &self.hooks.distribute),
            ("collaborate", &self.hooks.collaborate),
        ] {
            if let Some(argv) = hook
                && argv.first().is_none_or(|program| program.trim().is_empty())
            {
                return Err(ConfigError::invalid(format!(
                    "hooks.{} must name a program",
                    name
                )));
            }
        }

        Ok(())
    }
}
