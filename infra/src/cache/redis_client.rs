//! Redis connection management
//!
//! Opens a multiplexed connection with retry and exponential backoff at
//! startup. Individual commands are never retried here; callers that need
//! atomicity run a script instead.

use redis::{aio::MultiplexedConnection, Client};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use otp_shared::CacheConfig;

use crate::InfrastructureError;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Redis client holding one multiplexed connection
///
/// Cloning is cheap; every clone shares the same underlying connection.
#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
    config: CacheConfig,
}

impl RedisClient {
    /// Connect with the default policy: 3 attempts starting at 100ms
    pub async fn new(config: CacheConfig) -> Result<Self, InfrastructureError> {
        Self::new_with_retry_config(config, 3, 100).await
    }

    /// Connect, retrying up to `max_retries` times with exponential backoff
    pub async fn new_with_retry_config(
        config: CacheConfig,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Result<Self, InfrastructureError> {
        let url = Self::connection_url(&config);
        let client = Client::open(url.as_str()).map_err(|e| {
            error!(event = "redis_url_invalid", url = %mask_url(&url), error = %e, "Invalid Redis URL");
            InfrastructureError::Config(format!("Invalid Redis URL: {}", e))
        })?;

        let connection =
            Self::connect_with_backoff(&client, config.connect_timeout(), max_retries, retry_delay_ms)
                .await?;

        info!(event = "redis_connected", url = %mask_url(&url), "Redis connection established");
        Ok(Self { connection, config })
    }

    /// Each attempt is bounded by `connect_timeout`; the pause between
    /// attempts doubles up to five seconds
    async fn connect_with_backoff(
        client: &Client,
        connect_timeout: Duration,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Result<MultiplexedConnection, InfrastructureError> {
        let max_retries = max_retries.max(1);
        let mut delay = Duration::from_millis(retry_delay_ms);

        for attempt in 1..=max_retries {
            debug!(attempt, "Connecting to Redis");

            let error = match timeout(connect_timeout, client.get_multiplexed_async_connection()).await {
                Ok(Ok(connection)) => return Ok(connection),
                Ok(Err(e)) => InfrastructureError::Cache(e),
                Err(_) => InfrastructureError::Config(format!(
                    "Redis connection timed out after {:?}",
                    connect_timeout
                )),
            };

            if attempt == max_retries {
                error!(event = "redis_connect_failed", attempts = attempt, error = %error, "Giving up on Redis");
                return Err(error);
            }
            warn!(
                attempt,
                max_retries,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Redis connection attempt failed"
            );
            sleep(delay).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }

        Err(InfrastructureError::Config("Redis connection was never attempted".to_string()))
    }

    /// URL with the configured database index applied
    fn connection_url(config: &CacheConfig) -> String {
        if config.database == 0 || config.url.rsplit('/').next().is_some_and(|db| db.parse::<u8>().is_ok()) {
            config.url.clone()
        } else {
            format!("{}/{}", config.url.trim_end_matches('/'), config.database)
        }
    }

    /// A handle to the shared connection
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Apply the configured global key prefix, if any
    pub fn make_key(&self, key: &str) -> String {
        self.config.make_key(key)
    }

    /// PING the server
    pub async fn health_check(&self) -> Result<bool, InfrastructureError> {
        let mut conn = self.connection();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(reply == "PONG")
    }
}

/// Hide credentials in a Redis URL for logging
pub(crate) fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(proto_end) = url.find("://") {
            let proto = &url[..proto_end + 3];
            let host_part = &url[at_pos..];
            return format!("{}****{}", proto, host_part);
        }
    }
    url.to_string()
}
