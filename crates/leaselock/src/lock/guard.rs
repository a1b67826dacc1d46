//! RAII lease guard
//!
//! Release happens once: explicitly through `release`, otherwise from `Drop`
//! on the current runtime.

use std::fmt;
use std::ops::Deref;

use tracing::{debug, warn};

use super::handle::LockHandle;
use crate::error::Result;
use crate::store::LockStore;

/// Held lease released when the guard goes out of scope.
///
/// Prefer [`LockGuard::release`] in async code: it reports whether the lease
/// was still ours and surfaces store errors. Dropping an unreleased guard
/// spawns the release onto the current tokio runtime; outside a runtime the
/// lease is left to expire with its ttl.
pub struct LockGuard<S: LockStore + ?Sized + 'static> {
    handle: LockHandle<S>,
    armed: bool,
}

impl<S: LockStore + ?Sized + 'static> LockGuard<S> {
    pub(crate) fn new(handle: LockHandle<S>) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    pub fn handle(&self) -> &LockHandle<S> {
        &self.handle
    }

    /// Release the lease now.
    ///
    /// Returns `false` if the lease had already expired or been taken over.
    pub async fn release(mut self) -> Result<bool> {
        let released = self
            .handle
            .manager()
            .release(self.handle.key(), self.handle.token())
            .await;
        // Disarm only once the store call has finished; a cancelled release
        // is retried from Drop
        self.armed = false;
        released
    }
}

impl<S: LockStore + ?Sized + 'static> Deref for LockGuard<S> {
    type Target = LockHandle<S>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<S: LockStore + ?Sized + 'static> fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("handle", &self.handle)
            .field("armed", &self.armed)
            .finish()
    }
}

impl<S: LockStore + ?Sized + 'static> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    match handle.manager().release(handle.key(), handle.token()).await {
                        Ok(released) => {
                            debug!(key = %handle.key(), released, "Lock released on drop")
                        }
                        Err(e) => {
                            warn!(key = %handle.key(), error = %e, "Failed to release lock on drop")
                        }
                    }
                });
            }
            Err(_) => {
                warn!(
                    key = %handle.key(),
                    "Lock guard dropped outside a tokio runtime; lease will expire with its ttl"
                );
            }
        }
    }
}
