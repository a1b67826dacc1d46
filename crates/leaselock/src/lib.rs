//! leaselock - distributed mutual exclusion over a shared key-value store
//!
//! This crate provides:
//! - Lease locks fenced by random ownership tokens
//! - Atomic acquire / release / touch against any [`LockStore`]
//! - Scoped acquisition with release on every exit path
//! - An in-memory store for single-process use and tests
//!
//! ```no_run
//! use std::time::Duration;
//! use leaselock::{LockManager, MemoryStore};
//!
//! # async fn example() -> leaselock::Result<()> {
//! let manager = LockManager::new(MemoryStore::new());
//!
//! let total = manager
//!     .lock("orders:42", Duration::from_secs(5), |lock| async move {
//!         // critical section; renew if the work may outlive the ttl
//!         lock.touch(Duration::from_secs(10)).await?;
//!         Ok::<_, leaselock::LockError>(42)
//!     })
//!     .await??;
//! # let _ = total;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod store;

pub use self::config::LockerConfig;
pub use error::{LockError, Result};
pub use lock::{KeyedLocker, LockGuard, LockHandle, LockManager, MAX_TTL, new_token};
pub use store::{LockStore, MemoryStore};
