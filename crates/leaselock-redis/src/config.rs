use std::time::Duration;

use serde::Deserialize;

/// Environment prefix for [`RedisStoreConfig`]
pub const ENV_PREFIX: &str = "LEASELOCK_REDIS";

/// Connection settings for [`RedisStore`](crate::RedisStore)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedisStoreConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Load from `LEASELOCK_REDIS_URL` / `LEASELOCK_REDIS_CONNECT_TIMEOUT_MS`
    pub fn from_env() -> leaselock::Result<Self> {
        leaselock::config::load_from_env(ENV_PREFIX)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379/0");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = RedisStoreConfig::new("redis://cache:6380/2")
            .with_connect_timeout(Duration::from_millis(750));

        assert_eq!(config.url, "redis://cache:6380/2");
        assert_eq!(config.connect_timeout_ms, 750);
    }
}
