//! Lock manager: acquire / release / touch over a [`LockStore`]

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::guard::LockGuard;
use super::handle::LockHandle;
use super::keyed::KeyedLocker;
use crate::config::LockerConfig;
use crate::error::{LockError, Result};
use crate::metrics;
use crate::store::LockStore;

/// Largest ttl any store accepts: millisecond expiries are signed 64-bit
pub const MAX_TTL: Duration = Duration::from_millis(i64::MAX as u64);

/// Stateless coordinator for lease-based locks.
///
/// The manager keeps no lock state of its own: every decision is made by one
/// atomic store primitive, so any number of managers (in this process or
/// elsewhere) may share a store. Cloning is cheap and clones share the store.
pub struct LockManager<S: ?Sized> {
    store: Arc<S>,
    config: Arc<LockerConfig>,
}

impl<S: ?Sized> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: LockStore> LockManager<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }
}

impl<S: LockStore + ?Sized> LockManager<S> {
    /// Build a manager over a store shared with other managers
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            config: Arc::new(LockerConfig::default()),
        }
    }

    pub fn with_config(mut self, config: LockerConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LockerConfig {
        &self.config
    }

    /// Try once to take the lease on `key` with a freshly generated token.
    ///
    /// Returns the token on success and `None` when a live lease exists.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        self.acquire_with_token(key, ttl, &new_token()).await
    }

    /// Try once to take the lease on `key` holding the caller's `token`.
    ///
    /// The token is stored verbatim. Reusing a token across acquisitions
    /// lets those holders release or renew each other's leases, so callers
    /// supplying their own must keep it unique.
    pub async fn acquire_with_token(
        &self,
        key: &str,
        ttl: Duration,
        token: &str,
    ) -> Result<Option<String>> {
        validate_key(key)?;
        validate_token(token)?;
        let ttl = self.validate_ttl(ttl)?;

        let acquired = self
            .store
            .set_if_absent(key, token, ttl)
            .await
            .inspect_err(|_| metrics::record_store_error("acquire"))?;
        metrics::record_acquire(acquired);

        if acquired {
            debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Lock acquired");
            Ok(Some(token.to_string()))
        } else {
            debug!(key = %key, "Lock is held by another owner");
            Ok(None)
        }
    }

    /// Release the lease on `key` if it is still held by `token`.
    ///
    /// `false` means the lease was no longer ours (expired, possibly taken
    /// over); nothing was deleted.
    pub async fn release(&self, key: &str, token: &str) -> Result<bool> {
        validate_key(key)?;
        validate_token(token)?;

        let released = self
            .store
            .compare_and_delete(key, token)
            .await
            .inspect_err(|_| metrics::record_store_error("release"))?;
        metrics::record_release(released);
        debug!(key = %key, released, "Lock release");
        Ok(released)
    }

    /// Reset the expiry of the lease on `key` to `ttl` if still held by `token`.
    pub async fn touch(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        validate_key(key)?;
        validate_token(token)?;
        let ttl = self.validate_ttl(ttl)?;

        let renewed = self
            .store
            .compare_and_set_expiry(key, token, ttl)
            .await
            .inspect_err(|_| metrics::record_store_error("touch"))?;
        metrics::record_touch(renewed);
        debug!(key = %key, renewed, ttl_ms = ttl.as_millis() as u64, "Lock touch");
        Ok(renewed)
    }

    /// Pre-bind `key` for repeated scoped locking
    pub fn keyed(&self, key: impl Into<String>) -> KeyedLocker<S> {
        KeyedLocker::new(self.clone(), key.into())
    }

    fn validate_ttl(&self, ttl: Duration) -> Result<Duration> {
        if ttl.as_millis() == 0 {
            return Err(LockError::InvalidTtl(format!(
                "ttl must be at least 1ms, got {ttl:?}"
            )));
        }
        if ttl > MAX_TTL {
            return Err(LockError::InvalidTtl(format!(
                "ttl {ttl:?} exceeds the store limit of {MAX_TTL:?}"
            )));
        }
        if let Some(max) = self.config.max_ttl()
            && ttl > max
        {
            return Err(LockError::InvalidTtl(format!(
                "ttl {ttl:?} exceeds configured maximum {max:?}"
            )));
        }
        Ok(ttl)
    }
}

impl<S: LockStore + ?Sized + 'static> LockManager<S> {
    /// Acquire `key` and return a guard releasing it when dropped.
    ///
    /// Fails with [`LockError::Acquisition`] if the resource is held; there
    /// is no waiting or retrying.
    pub async fn guard(&self, key: &str, ttl: Duration) -> Result<LockGuard<S>> {
        match self.acquire(key, ttl).await? {
            Some(token) => Ok(LockGuard::new(LockHandle::new(
                self.clone(),
                key.to_string(),
                token,
            ))),
            None => Err(LockError::Acquisition {
                key: key.to_string(),
            }),
        }
    }

    /// Run `section` while holding the lease on `key`.
    ///
    /// The lease is released exactly once after `section` finishes, whether
    /// it returns normally, returns an error value, or panics. If the
    /// returned future is dropped mid-section, the release is spawned onto
    /// the current runtime. A lease found already gone at release time is
    /// logged, not reported.
    pub async fn lock<F, Fut, T>(&self, key: &str, ttl: Duration, section: F) -> Result<T>
    where
        F: FnOnce(LockHandle<S>) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.guard(key, ttl).await?;
        let handle = guard.handle().clone();
        let outcome = AssertUnwindSafe(async move { section(handle).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(value) => {
                if !guard.release().await? {
                    warn!(key = %key, "Lease was already gone when the scope exited");
                }
                Ok(value)
            }
            Err(panic) => {
                if let Err(e) = guard.release().await {
                    warn!(key = %key, error = %e, "Failed to release lock after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Fresh random ownership token
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(LockError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(LockError::InvalidToken(
            "token must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TTL: Duration = Duration::from_secs(5);

    fn manager() -> LockManager<MemoryStore> {
        LockManager::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_acquire_generates_distinct_tokens() {
        let manager = manager();

        let a = manager.acquire("a", TTL).await.unwrap().unwrap();
        let b = manager.acquire("b", TTL).await.unwrap().unwrap();

        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn test_acquire_with_custom_token() {
        let manager = manager();

        let token = manager
            .acquire_with_token("res", TTL, "custom-token-12345")
            .await
            .unwrap();

        assert_eq!(token.as_deref(), Some("custom-token-12345"));
        assert_eq!(
            manager.store().get("res"),
            Some("custom-token-12345".to_string())
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_arguments() {
        let manager = manager();

        assert!(matches!(
            manager.acquire("", TTL).await,
            Err(LockError::InvalidKey(_))
        ));
        assert!(matches!(
            manager.acquire("res", Duration::ZERO).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert!(matches!(
            manager.acquire("res", Duration::from_micros(900)).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert!(matches!(
            manager.acquire_with_token("res", TTL, "").await,
            Err(LockError::InvalidToken(_))
        ));
        assert!(matches!(
            manager.release("", "token").await,
            Err(LockError::InvalidKey(_))
        ));
        assert!(matches!(
            manager.touch("res", "token", Duration::ZERO).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert!(manager.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_ttl_beyond_store_limit() {
        let manager = manager();

        assert!(matches!(
            manager.acquire("res", Duration::MAX).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert!(matches!(
            manager.acquire("res", MAX_TTL + Duration::from_millis(1)).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert!(manager.store().is_empty());

        let token = manager.acquire("res", TTL).await.unwrap().unwrap();
        assert!(matches!(
            manager.touch("res", &token, Duration::MAX).await,
            Err(LockError::InvalidTtl(_))
        ));
        assert_eq!(manager.store().remaining_ttl("res"), Some(TTL));
        assert!(manager.release("res", &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_max_ttl_bound() {
        let manager = manager().with_config(
            LockerConfig::default().with_max_ttl(Duration::from_secs(10)),
        );

        assert!(manager.acquire("res", Duration::from_secs(10)).await.unwrap().is_some());
        assert!(matches!(
            manager.acquire("other", Duration::from_secs(11)).await,
            Err(LockError::InvalidTtl(_))
        ));
    }

    #[tokio::test]
    async fn test_clone_shares_store() {
        let manager = manager();
        let clone = manager.clone();

        let token = manager.acquire("res", TTL).await.unwrap().unwrap();
        assert!(clone.acquire("res", TTL).await.unwrap().is_none());
        assert!(clone.release("res", &token).await.unwrap());
    }
}
