//! Locker configuration
//!
//! Values come from struct defaults, builder setters, or `LEASELOCK_*`
//! environment variables via [`LockerConfig::from_env`].

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{LockError, Result};

/// Environment prefix for [`LockerConfig`]
pub const ENV_PREFIX: &str = "LEASELOCK";

/// Shortest sweep interval the in-memory store will run with
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration shared by a [`LockManager`](crate::LockManager) and the
/// in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LockerConfig {
    /// Upper bound on any requested ttl. `None` leaves ttls unbounded.
    #[serde(default)]
    pub max_ttl_ms: Option<u64>,
    /// Interval of the [`MemoryStore`](crate::MemoryStore) expiry sweeper
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_sweep_interval_ms() -> u64 {
    5000
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            max_ttl_ms: None,
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl LockerConfig {
    /// Load from `LEASELOCK_MAX_TTL_MS` / `LEASELOCK_SWEEP_INTERVAL_MS`
    pub fn from_env() -> Result<Self> {
        let config: Self = load_from_env(ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval() < MIN_SWEEP_INTERVAL {
            return Err(LockError::Config(ConfigError::Message(format!(
                "sweep_interval_ms must be at least {}",
                MIN_SWEEP_INTERVAL.as_millis()
            ))));
        }
        if self.max_ttl_ms == Some(0) {
            return Err(LockError::Config(ConfigError::Message(
                "max_ttl_ms must be positive".to_string(),
            )));
        }
        Ok(())
    }

    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl_ms = Some(max_ttl.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn max_ttl(&self) -> Option<Duration> {
        self.max_ttl_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Deserialize `T` from environment variables named `{prefix}_{FIELD}`.
///
/// Missing variables fall back to the serde defaults of `T`.
pub fn load_from_env<T: DeserializeOwned>(prefix: &str) -> Result<T> {
    let settings = Config::builder()
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}
