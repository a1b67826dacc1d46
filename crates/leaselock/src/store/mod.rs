//! Store adapter contract
//!
//! The lock protocol needs exactly three primitives from the backing store,
//! each executed as one indivisible step on the store side. A client-side
//! read followed by a separate write does not satisfy this contract: a lease
//! can expire and be re-acquired by another party between the two calls.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;

/// Key-value backend with atomic compare-and-set and expiry primitives
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with expiry `ttl` if the key is absent.
    ///
    /// Returns `true` iff the key was absent and is now set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Delete `key` if its current value equals `expected`.
    ///
    /// Returns `true` iff the value matched and the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> anyhow::Result<bool>;

    /// Reset the expiry of `key` to `ttl` if its current value equals `expected`.
    ///
    /// Returns `true` iff the value matched and the expiry was updated.
    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool>;
}

#[async_trait]
impl<S: LockStore + ?Sized> LockStore for Arc<S> {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<bool> {
        (**self).set_if_absent(key, value, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
        (**self).compare_and_delete(key, expected).await
    }

    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        (**self).compare_and_set_expiry(key, expected, ttl).await
    }
}
