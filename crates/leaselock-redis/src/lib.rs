//! Redis store adapter for leaselock
//!
//! Acquisition is a single `SET key token NX PX ttl`. Release and renewal run
//! as Lua scripts so the token comparison and the `DEL` / `PEXPIRE` execute
//! as one step on the server.
//!
//! ```no_run
//! use std::time::Duration;
//! use leaselock::LockManager;
//! use leaselock_redis::{RedisStore, RedisStoreConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = RedisStore::connect(&RedisStoreConfig::from_env()?).await?;
//! let manager = LockManager::new(store);
//!
//! manager
//!     .lock("reports:nightly", Duration::from_secs(30), |_lock| async {
//!         // critical section
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use leaselock::LockStore;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::info;

pub use config::RedisStoreConfig;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const TOUCH_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// [`LockStore`] backed by a single Redis server
pub struct RedisStore {
    conn: ConnectionManager,
    release: Script,
    touch: Script,
}

impl RedisStore {
    /// Wrap an existing connection manager
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release: Script::new(RELEASE_SCRIPT),
            touch: Script::new(TOUCH_SCRIPT),
        }
    }

    /// Open a managed connection to `config.url`
    pub async fn connect(config: &RedisStoreConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .with_context(|| format!("invalid redis url '{}'", config.url))?;
        let conn = tokio::time::timeout(config.connect_timeout(), client.get_connection_manager())
            .await
            .with_context(|| format!("timed out connecting to {}", config.url))??;
        info!(url = %config.url, "Connected to redis lock store");
        Ok(Self::new(conn))
    }

    /// Current value of `key`
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    /// Remaining time to live of `key`, or `None` if it is missing or has no expiry
    pub async fn pttl(&self, key: &str) -> anyhow::Result<Option<Duration>> {
        let mut conn = self.conn.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    /// Delete `key` unconditionally
    pub async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed == 1)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, i64::MAX as u128) as u64
}

#[async_trait]
impl LockStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let updated: i64 = self
            .touch
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }
}
