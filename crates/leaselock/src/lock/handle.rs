use std::fmt;
use std::time::Duration;

use super::manager::LockManager;
use crate::error::Result;
use crate::store::LockStore;

/// Capability bound to one held lease: a (key, token) pair plus the manager
/// that issued it.
///
/// The handle holds no lease state of its own. Renewal goes through
/// [`LockManager::touch`] with the same ownership check.
pub struct LockHandle<S: ?Sized> {
    manager: LockManager<S>,
    key: String,
    token: String,
}

impl<S: ?Sized> LockHandle<S> {
    pub(crate) fn new(manager: LockManager<S>, key: String, token: String) -> Self {
        Self {
            manager,
            key,
            token,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ownership token identifying this acquisition
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn manager(&self) -> &LockManager<S> {
        &self.manager
    }
}

impl<S: LockStore + ?Sized> LockHandle<S> {
    /// Reset the lease expiry to `ttl`.
    ///
    /// Returns `false` if the lease is no longer held by this handle.
    pub async fn touch(&self, ttl: Duration) -> Result<bool> {
        self.manager.touch(&self.key, &self.token, ttl).await
    }
}

impl<S: ?Sized> Clone for LockHandle<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            key: self.key.clone(),
            token: self.token.clone(),
        }
    }
}

impl<S: ?Sized> fmt::Debug for LockHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish()
    }
}
