//! MySQL settings for the durable SMS retry queue

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigError;

/// Connection pool settings; only read when the retry queue backend is MySQL
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,

    /// Seconds to wait for a free connection
    pub connect_timeout: u64,

    /// Seconds before an unused connection is closed
    pub idle_timeout: u64,

    /// Seconds before any connection is recycled
    pub max_lifetime: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::from("mysql://localhost:3306/yellowbook"),
            max_connections: 10,
            connect_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 1800,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Read `DATABASE_URL` and the optional `DATABASE_*` pool overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or(defaults.url),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", defaults.max_connections),
            connect_timeout: env_parse("DATABASE_CONNECT_TIMEOUT", defaults.connect_timeout),
            idle_timeout: env_parse("DATABASE_IDLE_TIMEOUT", defaults.idle_timeout),
            max_lifetime: env_parse("DATABASE_MAX_LIFETIME", defaults.max_lifetime),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url.starts_with("mysql://") {
            return Err(ConfigError::invalid("database.url", "expected a mysql:// URL"));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be at least 1"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
