//! Cache configuration module

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend holding verification records and provider bans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Shared Redis server; safe for multi-instance deployments
    Redis,
    /// In-process memory; single instance only
    Memory,
}

impl std::str::FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(CacheType::Redis),
            "memory" | "local" => Ok(CacheType::Memory),
            _ => Err(format!("Invalid cache type: {}", s)),
        }
    }
}

/// Where verification records and provider bans live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_type")]
    pub backend: CacheType,

    /// Redis connection URL; ignored by the memory backend
    #[serde(default = "default_url")]
    pub url: String,

    /// Seconds allowed for each Redis connection attempt
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Namespace prepended to every Redis key, e.g. per tenant
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Redis logical database (0-15)
    #[serde(default)]
    pub database: u8,

    /// Lock stripes used by the in-memory backend
    #[serde(default = "default_local_shards")]
    pub local_shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(default_url())
    }
}

impl CacheConfig {
    /// Redis backend at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            backend: default_cache_type(),
            url: url.into(),
            connection_timeout: default_connection_timeout(),
            key_prefix: None,
            database: 0,
            local_shards: default_local_shards(),
        }
    }

    /// Single-process backend for tests and local development
    pub fn memory() -> Self {
        Self {
            backend: CacheType::Memory,
            ..Self::default()
        }
    }

    /// Read `CACHE_BACKEND`, `REDIS_URL`, `REDIS_KEY_PREFIX` and `REDIS_DB`
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let mut config = var("REDIS_URL").map(Self::new).unwrap_or_default();

        if let Some(backend) = var("CACHE_BACKEND").and_then(|v| v.parse().ok()) {
            config.backend = backend;
        }
        if let Some(db) = var("REDIS_DB").and_then(|v| v.parse().ok()) {
            config = config.with_database(db);
        }
        config.key_prefix = var("REDIS_KEY_PREFIX");
        config
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Select a logical database, clamped to Redis' default range
    pub fn with_database(mut self, db: u8) -> Self {
        self.database = db.min(15);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    /// `key` inside the configured namespace
    pub fn make_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn default_cache_type() -> CacheType {
    CacheType::Redis
}

fn default_url() -> String {
    String::from("redis://localhost:6379")
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_local_shards() -> usize {
    16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.backend, CacheType::Redis);
        assert_eq!(config.database, 0);
        assert_eq!(config.local_shards, 16);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_cache_config_with_prefix() {
        let config = CacheConfig::new("redis://cache:6379")
            .with_prefix("yellowbook")
            .with_database(20);

        assert_eq!(config.make_key("phone_code:login:138"), "yellowbook:phone_code:login:138");
        assert_eq!(config.database, 15);
    }

    #[test]
    fn test_cache_key_without_prefix() {
        let config = CacheConfig::memory();
        assert_eq!(config.backend, CacheType::Memory);
        assert_eq!(config.make_key("banned_sms:twilio"), "banned_sms:twilio");
    }

    #[test]
    fn test_cache_type_parse() {
        assert_eq!("Redis".parse::<CacheType>(), Ok(CacheType::Redis));
        assert_eq!("local".parse::<CacheType>(), Ok(CacheType::Memory));
        assert!("memcached".parse::<CacheType>().is_err());
    }
}
