//! Configuration module with engine-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `verification` - Code lifetime, cooldown, attempts and format
//! - `cache` - Backend selection and Redis configuration
//! - `database` - MySQL pool for the durable retry queue
//! - `notification` - Ordered SMS providers, bans and retries
//! - `environment` - Environment detection and logging configuration

pub mod cache;
pub mod database;
pub mod environment;
pub mod notification;
pub mod verification;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheType};
pub use database::DatabaseConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use notification::{NotificationConfig, ProviderConfig, ProviderKind, QueueBackend, RetryConfig};
pub use verification::VerificationConfig;

/// Complete engine configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Environment configuration
    #[serde(default)]
    pub environment: Environment,

    /// Code issuing policy
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// SMS delivery configuration
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            verification: VerificationConfig::default(),
            cache: CacheConfig::default(),
            database: DatabaseConfig::default(),
            notification: NotificationConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Create configuration for development environment
    ///
    /// Everything stays in-process: memory code store, memory bans,
    /// memory retry queue and a log-only provider.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            verification: VerificationConfig::default(),
            cache: CacheConfig::memory(),
            database: DatabaseConfig::default(),
            notification: NotificationConfig::default(),
            logging: LoggingConfig::for_environment(Environment::Development),
        }
    }

    /// Create configuration for production environment
    pub fn production() -> Self {
        let mut notification = NotificationConfig::default();
        notification.retry.backend = QueueBackend::Mysql;

        Self {
            environment: Environment::Production,
            verification: VerificationConfig::default(),
            cache: CacheConfig::new("redis://redis:6379"),
            database: DatabaseConfig::new("mysql://mysql:3306/yellowbook").with_max_connections(50),
            notification,
            logging: LoggingConfig::for_environment(Environment::Production),
        }
    }

    /// Load configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = Environment::from_env();
        let base = match env {
            Environment::Production => Self::production(),
            _ => Self::development(),
        };

        let config = Self {
            environment: env,
            verification: VerificationConfig::from_env(),
            cache: if std::env::var("CACHE_BACKEND").is_ok() || std::env::var("REDIS_URL").is_ok() {
                CacheConfig::from_env()
            } else {
                base.cache
            },
            database: if std::env::var("DATABASE_URL").is_ok() {
                DatabaseConfig::from_env()
            } else {
                base.database
            },
            notification: NotificationConfig::from_env()?,
            logging: LoggingConfig::for_environment(env),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    ///
    /// A provider call must be able to time out, and its ban and retry
    /// task be recorded, before the caller's operation deadline passes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.verification.validate()?;
        if self.notification.retry.backend == QueueBackend::Mysql {
            self.database.validate()?;
        }
        self.notification.validate()?;
        if self.notification.send_timeout_ms >= self.verification.operation_timeout_ms {
            return Err(ConfigError::invalid(
                "notification.send_timeout_ms",
                format!(
                    "must be below verification.operation_timeout_ms ({})",
                    self.verification.operation_timeout_ms
                ),
            ));
        }
        Ok(())
    }
}
