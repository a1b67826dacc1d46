//! Error types for lease-based locking

/// Error type for lock operations
///
/// A `false` from [`release`](crate::LockManager::release) or
/// [`touch`](crate::LockManager::touch) is not an error: it means the caller
/// no longer owns the lease.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The single acquisition attempt found the resource already held
    #[error("failed to acquire lock '{key}': resource is held")]
    Acquisition { key: String },

    #[error("invalid lock key: {0}")]
    InvalidKey(String),

    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    #[error("invalid ownership token: {0}")]
    InvalidToken(String),

    /// Failure reported by the store adapter, passed through untouched
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl LockError {
    /// True when the error only signals contention on the resource
    pub fn is_contended(&self) -> bool {
        matches!(self, LockError::Acquisition { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
