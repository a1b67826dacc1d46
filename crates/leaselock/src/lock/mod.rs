//! Lease lock protocol
//!
//! This module provides:
//! - Lock manager with acquire / release / touch
//! - Scoped acquisition (`lock`) and its RAII form (`guard`)
//! - Lock handles bound to one (key, token) pair
//! - Per-key facade (`keyed`)

mod guard;
mod handle;
mod keyed;
mod manager;

pub use guard::LockGuard;
pub use handle::LockHandle;
pub use keyed::KeyedLocker;
pub use manager::{LockManager, MAX_TTL, new_token};
