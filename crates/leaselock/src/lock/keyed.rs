use std::future::Future;
use std::time::Duration;

use super::guard::LockGuard;
use super::handle::LockHandle;
use super::manager::LockManager;
use crate::error::Result;
use crate::store::LockStore;

/// A [`LockManager`] pre-bound to one resource key
pub struct KeyedLocker<S: ?Sized> {
    manager: LockManager<S>,
    key: String,
}

impl<S: ?Sized> KeyedLocker<S> {
    pub(crate) fn new(manager: LockManager<S>, key: String) -> Self {
        Self { manager, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn manager(&self) -> &LockManager<S> {
        &self.manager
    }
}

impl<S: LockStore + ?Sized + 'static> KeyedLocker<S> {
    /// See [`LockManager::lock`]
    pub async fn lock<F, Fut, T>(&self, ttl: Duration, section: F) -> Result<T>
    where
        F: FnOnce(LockHandle<S>) -> Fut,
        Fut: Future<Output = T>,
    {
        self.manager.lock(&self.key, ttl, section).await
    }

    /// See [`LockManager::guard`]
    pub async fn guard(&self, ttl: Duration) -> Result<LockGuard<S>> {
        self.manager.guard(&self.key, ttl).await
    }
}

impl<S: ?Sized> Clone for KeyedLocker<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            key: self.key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TTL: Duration = Duration::from_secs(3);

    #[tokio::test]
    async fn test_keyed_lock() {
        let manager = LockManager::new(MemoryStore::new());
        let resource = manager.keyed("test_resource");
        assert_eq!(resource.key(), "test_resource");

        let store = manager.store().clone();
        let token = resource
            .lock(TTL, |lock| async move {
                assert_eq!(lock.key(), "test_resource");
                assert_eq!(store.get("test_resource").as_deref(), Some(lock.token()));
                lock.token().to_string()
            })
            .await
            .unwrap();

        assert!(!token.is_empty());
        assert!(manager.store().is_empty());

        // The same facade can lock again once released
        let guard = resource.guard(TTL).await.unwrap();
        assert_eq!(guard.key(), "test_resource");
        assert!(guard.release().await.unwrap());
    }
}
