//! In-process lock store
//!
//! Leases live in a DashMap; each primitive runs under the shard lock of its key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::LockStore;
use crate::config::{LockerConfig, MIN_SWEEP_INTERVAL};

/// A stored lease value with its deadline
#[derive(Debug, Clone)]
struct StoredLease {
    value: String,
    expires_at: Instant,
}

fn deadline(now: Instant, ttl: Duration) -> anyhow::Result<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| anyhow::anyhow!("ttl {ttl:?} overflows the store clock"))
}

impl StoredLease {
    fn new(value: &str, now: Instant, ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            value: value.to_string(),
            expires_at: deadline(now, ttl)?,
        })
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn is_held_by(&self, expected: &str, now: Instant) -> bool {
        !self.is_expired(now) && self.value == expected
    }
}

/// In-memory [`LockStore`] shared by every manager holding the same instance.
///
/// Expired leases are invisible to all operations as soon as their deadline
/// passes. They are physically removed lazily on access, or periodically when
/// a sweeper is started with [`MemoryStore::with_sweeper`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredLease>>,
    sweeper: Option<JoinHandle<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a sweeper running at `config.sweep_interval_ms`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &LockerConfig) -> Self {
        Self::new().with_sweeper(config.sweep_interval())
    }

    /// Start a background task purging expired leases every `interval`.
    ///
    /// Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
    /// Must be called from within a tokio runtime.
    pub fn with_sweeper(mut self, interval: Duration) -> Self {
        if let Some(previous) = self.sweeper.take() {
            previous.abort();
        }
        if interval < MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = interval.as_millis() as u64,
                "Sweep interval below minimum, using {MIN_SWEEP_INTERVAL:?}"
            );
        }
        let interval = interval.max(MIN_SWEEP_INTERVAL);

        let entries = self.entries.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = Self::purge_expired(&entries);
                if purged > 0 {
                    debug!(count = purged, "Purged expired leases");
                }
            }
        });
        info!(interval_ms = interval.as_millis() as u64, "MemoryStore sweeper started");

        self.sweeper = Some(handle);
        self
    }

    fn purge_expired(entries: &DashMap<String, StoredLease>) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        entries.retain(|_, lease| {
            let keep = !lease.is_expired(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    /// Current holder token of `key`, if a live lease exists
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|lease| !lease.is_expired(now))
            .map(|lease| lease.value.clone())
    }

    /// Time left before the lease on `key` expires
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|lease| !lease.is_expired(now))
            .map(|lease| lease.expires_at - now)
    }

    /// Number of live leases
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|lease| !lease.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredLease::new(value, now, ttl)?);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredLease::new(value, now, ttl)?);
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, lease| lease.is_held_by(expected, now))
            .is_some();
        if !removed {
            // Drop a dead lease left behind under this key, whoever owned it
            self.entries.remove_if(key, |_, lease| lease.is_expired(now));
        }
        Ok(removed)
    }

    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut lease) if lease.is_held_by(expected, now) => {
                lease.expires_at = deadline(now, ttl)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("res", "a", TTL).await.unwrap());
        assert!(!store.set_if_absent("res", "b", TTL).await.unwrap());
        assert_eq!(store.get("res"), Some("a".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_replaces_expired_lease() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("res", "a", Duration::from_millis(10)).await.unwrap());
        tokio::time::advance(Duration::from_millis(10)).await;

        assert_eq!(store.get("res"), None);
        assert!(store.set_if_absent("res", "b", TTL).await.unwrap());
        assert_eq!(store.get("res"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let store = MemoryStore::new();
        store.set_if_absent("res", "a", TTL).await.unwrap();

        assert!(!store.compare_and_delete("res", "b").await.unwrap());
        assert_eq!(store.get("res"), Some("a".to_string()));

        assert!(store.compare_and_delete("res", "a").await.unwrap());
        assert!(store.is_empty());
        assert!(!store.compare_and_delete("res", "a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_and_delete_ignores_expired_lease() {
        let store = MemoryStore::new();
        store
            .set_if_absent("res", "a", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;

        assert!(!store.compare_and_delete("res", "a").await.unwrap());
        assert!(store.entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_and_set_expiry() {
        let store = MemoryStore::new();
        store
            .set_if_absent("res", "a", Duration::from_millis(100))
            .await
            .unwrap();

        assert!(!store.compare_and_set_expiry("res", "b", TTL).await.unwrap());
        assert_eq!(store.remaining_ttl("res"), Some(Duration::from_millis(100)));

        assert!(store.compare_and_set_expiry("res", "a", TTL).await.unwrap());
        assert_eq!(store.remaining_ttl("res"), Some(TTL));

        assert!(!store.compare_and_set_expiry("missing", "a", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_leases() {
        let config = LockerConfig::default().with_sweep_interval(Duration::from_millis(50));
        let store = MemoryStore::from_config(&config);
        store
            .set_if_absent("short", "a", Duration::from_millis(10))
            .await
            .unwrap();
        store.set_if_absent("long", "b", TTL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.entries.len(), 1);
        assert!(store.entries.contains_key("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_with_zero_interval_keeps_running() {
        let config = LockerConfig::default().with_sweep_interval(Duration::ZERO);
        let store = MemoryStore::from_config(&config);
        store
            .set_if_absent("short", "a", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.entries.is_empty());
        assert!(!store.sweeper.as_ref().unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("res", "a", Duration::MAX).await.is_err());
        assert!(store.entries.is_empty());

        store.set_if_absent("res", "a", TTL).await.unwrap();
        assert!(
            store
                .compare_and_set_expiry("res", "a", Duration::MAX)
                .await
                .is_err()
        );
        assert_eq!(store.get("res"), Some("a".to_string()));
    }
}
