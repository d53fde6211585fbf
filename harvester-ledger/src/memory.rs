//! In-process ledger store
//!
//! Follows the same expiry rules as the Redis store using the tokio clock,
//! so tests can drive expiry with a paused runtime.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, Remaining};

struct Marker {
    value: String,
    expires_at: Instant,
}

/// Ledger store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    markers: Mutex<HashMap<String, Marker>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as if the store were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current marker value under `key`, if live
    pub fn marker(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.markers()
            .get(key)
            .filter(|marker| marker.expires_at > now)
            .map(|marker| marker.value.clone())
    }

    fn markers(&self) -> MutexGuard<'_, HashMap<String, Marker>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            let err = std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory store is offline",
            );
            return Err(LedgerError::from(redis::RedisError::from(err)));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn refresh(&self, key: &str, marker: &str, window: Duration) -> Result<Remaining> {
        self.check_online()?;

        let now = Instant::now();
        let previous = self.markers().insert(
            key.to_string(),
            Marker {
                value: marker.to_string(),
                expires_at: now + window,
            },
        );

        Ok(match previous {
            Some(previous) if previous.expires_at > now => Remaining::Fresh {
                ttl_secs: (previous.expires_at - now).as_secs(),
            },
            _ => Remaining::Renewed {
                ttl_secs: window.as_secs(),
            },
        })
    }

    async fn remaining(&self, key: &str) -> Result<Option<Duration>> {
        self.check_online()?;

        let now = Instant::now();
        Ok(self
            .markers()
            .get(key)
            .filter(|marker| marker.expires_at > now)
            .map(|marker| marker.expires_at - now))
    }
}
