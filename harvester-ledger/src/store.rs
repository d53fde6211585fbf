//! Store contract the ledger relies on

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::Result;

/// What a refresh found in the store before it wrote the new marker
///
/// Either way the marker now holds the refresh time and expires a full
/// window from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Remaining {
    /// No live marker with an expiry existed; `ttl_secs` is the new window
    Renewed { ttl_secs: u64 },

    /// A live marker still had `ttl_secs` left and has been bumped
    Fresh { ttl_secs: u64 },
}

impl Remaining {
    pub fn ttl_secs(&self) -> u64 {
        match self {
            Remaining::Renewed { ttl_secs } | Remaining::Fresh { ttl_secs } => *ttl_secs,
        }
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remaining::Renewed { ttl_secs } => write!(f, "renewed {}s", ttl_secs),
            Remaining::Fresh { ttl_secs } => write!(f, "fresh {}s", ttl_secs),
        }
    }
}

/// Get/set-with-expiry operations on the remote key-value store
///
/// Implementations never cache: every call is a round trip to the store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Checks that the store answers
    async fn ping(&self) -> Result<()>;

    /// Writes `marker` under `key` with the given expiry, replacing any
    /// previous marker, and reports what was there before
    async fn refresh(&self, key: &str, marker: &str, window: Duration) -> Result<Remaining>;

    /// Remaining validity of the marker under `key`, if one is live
    async fn remaining(&self, key: &str) -> Result<Option<Duration>>;
}
