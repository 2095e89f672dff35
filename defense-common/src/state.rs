//! Typed wrappers over the shared key-value store (C1).
//!
//! Isolated by logical database index per entity kind, per the state store
//! layout: DB 1 tarpit flags, DB 2 blocklist, DB 3 frequency, DB 4 hop
//! counters. Connection multiplexing is a single `ConnectionManager` per
//! process, cloned into every component's `Runtime`.

use std::net::IpAddr;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::warn;

use crate::error::{DefenseError, Result};

const DB_TARPIT_FLAGS: i64 = 1;
const DB_BLOCKLIST: i64 = 2;
const DB_FREQUENCY: i64 = 3;
const DB_HOP_COUNTS: i64 = 4;

const MAX_FREQUENCY_ENTRIES: isize = 4096;

#[derive(Debug, Clone)]
pub struct StateStoreConfig {
    pub url: String,
    pub operation_timeout: Duration,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            operation_timeout: Duration::from_millis(1000),
        }
    }
}

/// Shared key-value store client used by every component that needs
/// blocklist, tarpit-flag, frequency, or hop-count state.
#[derive(Clone)]
pub struct StateStore {
    manager: redis::aio::ConnectionManager,
    timeout: Duration,
}

fn normalize(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(|v4| v4.to_string())
            .unwrap_or_else(|| v6.to_string()),
    }
}

impl StateStore {
    pub async fn connect(config: &StateStoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.clone())
            .map_err(|e| DefenseError::StateStore(format!("invalid state store url: {e}")))?;
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| DefenseError::StateStore(format!("connecting to state store: {e}")))?;
        Ok(Self {
            manager,
            timeout: config.operation_timeout,
        })
    }

    async fn with_db<T, F, Fut>(&self, db: i64, op: F) -> std::result::Result<T, redis::RedisError>
    where
        F: FnOnce(redis::aio::ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, redis::RedisError>>,
    {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SELECT")
            .arg(db)
            .query_async(&mut conn)
            .await?;
        op(conn).await
    }

    /// `is_blocked(src) -> bool`. Fails open: any timeout or connection
    /// error is logged and treated as "not blocked".
    pub async fn is_blocked(&self, src: IpAddr) -> bool {
        let key = format!("blocklist:ip:{}", normalize(src));
        let fut = self.with_db(DB_BLOCKLIST, |mut conn| async move {
            conn.exists::<_, bool>(&key).await
        });
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(exists)) => exists,
            Ok(Err(e)) => {
                warn!(error = %e, "state store error on blocklist lookup, failing open");
                false
            }
            Err(_) => {
                warn!("state store timeout on blocklist lookup, failing open");
                false
            }
        }
    }

    /// `add_block(src, ttl, reason)`. Idempotent: a later call with a
    /// shorter remaining TTL than the already-stored entry still extends
    /// expiry to `max(existing, new)` because a plain `SET ... EX` always
    /// overwrites, so callers must pass the full desired TTL each time.
    pub async fn add_block(&self, src: IpAddr, ttl: Duration, reason: &str) -> Result<()> {
        let key = format!("blocklist:ip:{}", normalize(src));
        let reason = reason.to_string();
        let ttl_secs = ttl.as_secs().max(1);
        let fut = self.with_db(DB_BLOCKLIST, move |mut conn| async move {
            let existing_ttl: i64 = conn.ttl(&key).await.unwrap_or(-1);
            let new_ttl = if existing_ttl > 0 {
                existing_ttl.max(ttl_secs as i64) as u64
            } else {
                ttl_secs
            };
            conn.set_ex::<_, _, ()>(&key, reason, new_ttl).await
        });
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DefenseError::StateStore("timeout writing blocklist entry".to_string()))??;
        Ok(())
    }

    /// `flag_tarpit(src, ttl)`.
    pub async fn flag_tarpit(&self, src: IpAddr, ttl: Duration) -> Result<()> {
        let key = format!("tarpit:flag:{}", normalize(src));
        let ttl_secs = ttl.as_secs().max(1);
        let fut = self.with_db(DB_TARPIT_FLAGS, move |mut conn| async move {
            conn.set_ex::<_, _, ()>(&key, 1, ttl_secs).await
        });
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DefenseError::StateStore("timeout writing tarpit flag".to_string()))??;
        Ok(())
    }

    /// `incr_hops(src, window) -> int`. Atomic increment with
    /// first-write-sets-expiry semantics: the TTL is only set on the
    /// increment that creates the key.
    pub async fn incr_hops(&self, src: IpAddr, window: Duration) -> Result<i64> {
        let key = format!("hops:{}", normalize(src));
        let window_secs = window.as_secs().max(1);
        let fut = self.with_db(DB_HOP_COUNTS, move |mut conn| async move {
            let count: i64 = conn.incr(&key, 1).await?;
            if count == 1 {
                let _: () = conn.expire(&key, window_secs as i64).await?;
            }
            Ok(count)
        });
        let count = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DefenseError::StateStore("timeout incrementing hop counter".to_string()))??;
        Ok(count)
    }

    /// `record_request(src, ts, window) -> int`. Appends to a bounded
    /// recent-timestamps list and returns the count within the window.
    pub async fn record_request(
        &self,
        src: IpAddr,
        ts: chrono::DateTime<chrono::Utc>,
        window: Duration,
    ) -> Result<i64> {
        let key = format!("freq:{}", normalize(src));
        let window_secs = window.as_secs().max(1) as i64;
        let ts_str = ts.to_rfc3339();
        let fut = self.with_db(DB_FREQUENCY, move |mut conn| async move {
            let _: () = conn.lpush(&key, &ts_str).await?;
            let _: () = conn.ltrim(&key, 0, MAX_FREQUENCY_ENTRIES - 1).await?;
            let _: () = conn.expire(&key, window_secs).await?;
            let entries: Vec<String> = conn.lrange(&key, 0, -1).await?;
            let cutoff = ts - chrono::Duration::seconds(window_secs);
            let count = entries
                .iter()
                .filter_map(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .filter(|t| t.with_timezone(&chrono::Utc) >= cutoff)
                .count();
            Ok(count as i64)
        });
        let count = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| DefenseError::StateStore("timeout recording request".to_string()))??;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ipv4() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(normalize(ip), "203.0.113.7");
    }

    #[test]
    fn test_normalize_ipv4_mapped_ipv6() {
        let ip: IpAddr = "::ffff:203.0.113.7".parse().unwrap();
        assert_eq!(normalize(ip), "203.0.113.7");
    }

    #[test]
    fn test_normalize_plain_ipv6_unchanged() {
        let ip: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(normalize(ip), "2001:db8::1");
    }
}
