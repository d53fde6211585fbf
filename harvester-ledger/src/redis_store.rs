//! Redis-backed ledger store

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, Remaining};

/// Reconnect attempts made by the connection manager before a call fails
const CONNECT_RETRIES: usize = 1;

/// Ledger store on a Redis server
///
/// Holds one connection manager, created on first use and shared by every
/// call. The manager reconnects on its own after the server goes away.
pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
    /// Create a store for the given URL (e.g. "redis://127.0.0.1:6379/0")
    ///
    /// No connection is made until the first operation.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(LedgerError::InvalidUrl)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening ledger connection");
                ConnectionManager::new_with_backoff(self.client.clone(), 2, 100, CONNECT_RETRIES)
                    .await
            })
            .await?;

        Ok(connection.clone())
    }
}

/// Reads the `TTL` reply taken just before the marker was overwritten
///
/// `-2` (no key) and `-1` (key without expiry) both mean there was no live
/// marker to bump.
fn previous_state(ttl: i64, window_secs: u64) -> Remaining {
    match u64::try_from(ttl) {
        Ok(ttl_secs) => Remaining::Fresh { ttl_secs },
        Err(_) => Remaining::Renewed {
            ttl_secs: window_secs,
        },
    }
}

#[async_trait]
impl LedgerStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn refresh(&self, key: &str, marker: &str, window: Duration) -> Result<Remaining> {
        let mut conn = self.connection().await?;
        let window_secs = window.as_secs().max(1);

        let (ttl,): (i64,) = redis::pipe()
            .atomic()
            .cmd("TTL")
            .arg(key)
            .cmd("SET")
            .arg(key)
            .arg(marker)
            .arg("EX")
            .arg(window_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(previous_state(ttl, window_secs))
    }

    async fn remaining(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection().await?;
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;

        Ok((ttl > 0).then(|| Duration::from_secs(ttl.unsigned_abs())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_bad_url() {
        let err = RedisStore::open("not a url").err().unwrap();
        assert!(matches!(err, LedgerError::InvalidUrl(_)));
    }

    #[test]
    fn test_open_does_not_connect() {
        // nothing listens on port 1; opening must still succeed
        assert!(RedisStore::open("redis://127.0.0.1:1/0").is_ok());
    }

    #[test]
    fn test_previous_state_of_live_marker() {
        assert_eq!(previous_state(42, 180), Remaining::Fresh { ttl_secs: 42 });
        // under half a second left still counts as live
        assert_eq!(previous_state(0, 180), Remaining::Fresh { ttl_secs: 0 });
    }

    #[test]
    fn test_previous_state_without_live_marker() {
        // key absent
        assert_eq!(previous_state(-2, 180), Remaining::Renewed { ttl_secs: 180 });
        // key without expiry; the SET gave it one
        assert_eq!(previous_state(-1, 180), Remaining::Renewed { ttl_secs: 180 });
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported() {
        let store = RedisStore::open("redis://127.0.0.1:1/0").unwrap();
        let err = store.ping().await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
