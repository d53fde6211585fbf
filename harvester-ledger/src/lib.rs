//! Harvester Freshness Ledger
//!
//! A thin client over a remote key-value store that keeps one freshness
//! marker per crawler class (or job). Every harvester process on every
//! machine refreshes the same keys, so the markers throttle and track work
//! across the whole deployment.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::config::{LedgerConfig, marker_window_secs};
//! use harvester_ledger::FreshnessLedger;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ledger = FreshnessLedger::redis(&LedgerConfig::default())?;
//!
//!     let remaining = ledger.refresh(&ledger.key_for("v2ray"), 3).await?;
//!     println!("v2ray: {}", remaining);
//!     Ok(())
//! }
//! ```

pub mod error;
mod memory;
mod redis_store;
mod store;

pub use error::{LedgerError, Result};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{LedgerStore, Remaining};

use harvester_core::config::{LedgerConfig, marker_window_secs};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client for the freshness ledger
///
/// Holds no state besides the store handle; nothing read from the store is
/// kept past the call that read it.
#[derive(Clone)]
pub struct FreshnessLedger {
    store: Arc<dyn LedgerStore>,
    key_template: String,
    threshold_unit_secs: u64,
    cross_threshold: u32,
}

impl FreshnessLedger {
    /// Create a ledger over any store
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            key_template: config.key_template.clone(),
            threshold_unit_secs: config.threshold_unit_secs,
            cross_threshold: config.cross_threshold,
        }
    }

    /// Create a ledger over the Redis server named in the config
    pub fn redis(config: &LedgerConfig) -> Result<Self> {
        let store = RedisStore::open(&config.redis_url)?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// Remote key of the marker for a crawler class or job
    pub fn key_for(&self, name: &str) -> String {
        self.key_template.replacen("{}", name, 1)
    }

    /// Threshold passed by sweeps
    pub fn cross_threshold(&self) -> u32 {
        self.cross_threshold
    }

    /// Checks that the store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Writes or bumps the marker under `key`
    ///
    /// The marker is set to the current time and expires
    /// `staleness_threshold` threshold units from now, whether or not a live
    /// marker was there. Connection failures are returned to the caller
    /// untouched.
    pub async fn refresh(&self, key: &str, staleness_threshold: u32) -> Result<Remaining> {
        let window_secs = marker_window_secs(self.threshold_unit_secs, staleness_threshold)
            .ok_or(LedgerError::WindowOutOfRange {
                threshold: staleness_threshold,
                unit_secs: self.threshold_unit_secs,
            })?;
        let window = Duration::from_secs(window_secs);
        let marker = chrono::Utc::now().to_rfc3339();
        self.store.refresh(key, &marker, window).await
    }

    /// Remaining validity of the marker for `name`, without writing
    pub async fn remaining(&self, name: &str) -> Result<Option<Duration>> {
        self.store.remaining(&self.key_for(name)).await
    }

    /// Refreshes the marker of every name, in order
    ///
    /// Stops at the first store error.
    pub async fn sweep(&self, names: &[String]) -> Result<Dashboard> {
        let mut dashboard = Dashboard::default();
        for name in names {
            let remaining = self
                .refresh(&self.key_for(name), self.cross_threshold)
                .await?;
            dashboard.entries.push((name.clone(), remaining));
        }

        debug!("<RemotePool | SpawnRhythm> {}", dashboard);
        Ok(dashboard)
    }
}

/// Result of one sweep, in sweep order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    entries: Vec<(String, Remaining)>,
}

impl Dashboard {
    pub fn entries(&self) -> &[(String, Remaining)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<Remaining> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, remaining)| *remaining)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, remaining) in &self.entries {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}[{}]", name, remaining)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerConfig {
        LedgerConfig {
            key_template: "v2rayc_spider:{}".to_string(),
            cross_threshold: 3,
            threshold_unit_secs: 60,
            ..LedgerConfig::default()
        }
    }

    fn ledger() -> (Arc<MemoryStore>, FreshnessLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = FreshnessLedger::new(store.clone(), &config());
        (store, ledger)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_key_for_applies_template() {
        let (_, ledger) = ledger();
        assert_eq!(ledger.key_for("ssr"), "v2rayc_spider:ssr");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_bumps_live_marker() {
        let (store, ledger) = ledger();
        let key = ledger.key_for("v2ray");

        let first = ledger.refresh(&key, 3).await.unwrap();
        assert_eq!(first, Remaining::Renewed { ttl_secs: 180 });
        let first_marker = store.marker(&key).unwrap();

        // the wall-clock marker needs real time to move forward
        std::thread::sleep(std::time::Duration::from_millis(5));
        tokio::time::advance(Duration::from_secs(90)).await;

        let second = ledger.refresh(&key, 3).await.unwrap();
        assert_eq!(second, Remaining::Fresh { ttl_secs: 90 });
        let second_marker = store.marker(&key).unwrap();
        assert_ne!(second_marker, first_marker);

        // a full window from the second refresh, not the first
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(
            ledger.remaining("v2ray").await.unwrap(),
            Some(Duration::from_secs(80))
        );
    }

    #[tokio::test]
    async fn test_oversized_window_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let config = LedgerConfig {
            threshold_unit_secs: u64::MAX / 2,
            ..config()
        };
        let ledger = FreshnessLedger::new(store, &config);

        let err = ledger.sweep(&names(&["v2ray"])).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::WindowOutOfRange { threshold: 3, .. }
        ));
        assert!(!err.is_unreachable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_marker_is_renewed() {
        let (_, ledger) = ledger();
        let key = ledger.key_for("v2ray");

        ledger.refresh(&key, 3).await.unwrap();
        tokio::time::advance(Duration::from_secs(181)).await;

        assert_eq!(ledger.remaining("v2ray").await.unwrap(), None);
        let renewed = ledger.refresh(&key, 3).await.unwrap();
        assert_eq!(renewed, Remaining::Renewed { ttl_secs: 180 });
    }

    #[tokio::test]
    async fn test_sweep_covers_every_name_in_order() {
        let (_, ledger) = ledger();
        let dashboard = ledger.sweep(&names(&["v2ray", "ssr", "trojan"])).await.unwrap();

        let swept: Vec<_> = dashboard.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(swept, vec!["v2ray", "ssr", "trojan"]);
        assert_eq!(dashboard.get("ssr"), Some(Remaining::Renewed { ttl_secs: 180 }));
        assert_eq!(
            dashboard.to_string(),
            "v2ray[renewed 180s] ssr[renewed 180s] trojan[renewed 180s]"
        );
    }

    #[tokio::test]
    async fn test_unreachable_store_propagates() {
        let (store, ledger) = ledger();
        store.set_offline(true);

        assert!(ledger.ping().await.unwrap_err().is_unreachable());
        let err = ledger.sweep(&names(&["v2ray"])).await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
