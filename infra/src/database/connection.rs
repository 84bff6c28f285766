//! MySQL pool backing the retry queue

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{ConnectOptions, MySqlPool};
use std::str::FromStr;
use std::time::Duration;
use tracing::log::LevelFilter;

use otp_shared::DatabaseConfig;

use crate::InfrastructureError;

/// Statements slower than this are logged at warn level
const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_millis(500);

/// Shared handle to the MySQL pool; cloning is cheap
#[derive(Clone)]
pub struct DatabasePool {
    pool: MySqlPool,
    config: DatabaseConfig,
}

impl DatabasePool {
    /// Open the pool and make sure at least one connection can be made
    pub async fn new(config: DatabaseConfig) -> Result<Self, InfrastructureError> {
        config.validate()?;

        let options = MySqlConnectOptions::from_str(&config.url)
            .map_err(|e| InfrastructureError::Config(format!("Invalid database URL: {}", e)))?
            .log_statements(LevelFilter::Trace)
            .log_slow_statements(LevelFilter::Warn, SLOW_STATEMENT_THRESHOLD);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(event = "database_connect_failed", error = %e, "Failed to open MySQL pool");
                InfrastructureError::Database(e)
            })?;

        tracing::info!(
            event = "database_connected",
            max_connections = config.max_connections,
            "MySQL pool ready"
        );

        Ok(Self { pool, config })
    }

    pub fn get_pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<(), InfrastructureError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::warn!(event = "database_unhealthy", error = %e, "MySQL health check failed");
                InfrastructureError::Database(e)
            })?;
        Ok(())
    }

    pub fn get_statistics(&self) -> PoolStatistics {
        PoolStatistics {
            connections: self.pool.size(),
            idle_connections: self.pool.num_idle(),
            max_connections: self.config.max_connections,
        }
    }

    /// Wait for checked-out connections to return, then close them all
    pub async fn close(&self) {
        tracing::info!(event = "database_closing", "{}", self.get_statistics());
        self.pool.close().await;
    }

    /// Create or upgrade the `sms_retry_tasks` schema
    pub async fn run_migrations(&self) -> Result<(), InfrastructureError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!(event = "database_migrated", "Retry queue schema is up to date");
        Ok(())
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatistics {
    pub connections: u32,
    pub idle_connections: usize,
    pub max_connections: u32,
}

impl std::fmt::Display for PoolStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} connections open, {} idle",
            self.connections, self.max_connections, self.idle_connections
        )
    }
}
