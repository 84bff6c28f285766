//! Provider ban-list shared through Redis
//!
//! A ban is the key `{prefix}:{provider}` with a millisecond expiry equal
//! to the ban duration. Redis drops the key when the ban ends, which is
//! what returns the provider to service.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info};

use otp_core::errors::NotifyError;
use otp_core::repositories::ProviderBanList;

use super::RedisClient;

/// Ban-list visible to every instance sharing the Redis server
pub struct RedisBanList {
    client: RedisClient,
    prefix: String,
}

impl RedisBanList {
    pub fn new(client: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, provider: &str) -> String {
        self.client.make_key(&format!("{}:{}", self.prefix, provider))
    }
}

fn ban_list_error(e: redis::RedisError) -> NotifyError {
    error!(error = %e, "Redis ban-list command failed");
    NotifyError::ban_list(e.to_string())
}

#[async_trait]
impl ProviderBanList for RedisBanList {
    async fn banned_among(&self, providers: &[String]) -> Result<HashSet<String>, NotifyError> {
        if providers.is_empty() {
            return Ok(HashSet::new());
        }

        let keys: Vec<String> = providers.iter().map(|name| self.key(name)).collect();
        let mut conn = self.client.connection();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(ban_list_error)?;

        Ok(providers
            .iter()
            .zip(values)
            .filter_map(|(name, value)| value.map(|_| name.clone()))
            .collect())
    }

    async fn ban(&self, provider: &str, duration: Duration) -> Result<bool, NotifyError> {
        let mut conn = self.client.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(provider))
            .arg(chrono::Utc::now().timestamp_millis())
            .arg("NX")
            .arg("PX")
            .arg(duration.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(ban_list_error)?;

        let placed = reply.is_some();
        if placed {
            info!(
                provider = provider,
                duration_ms = duration.as_millis() as u64,
                event = "provider_banned",
                "Banned SMS provider"
            );
        }
        Ok(placed)
    }
}
