//! Assembles the verification engine from configuration
//!
//! Each builder selects one implementation per port based on the loaded
//! [`AppConfig`]. [`Infrastructure::from_config`] runs them in order and
//! shares one Redis connection and one database pool between adapters.

use std::sync::Arc;

use otp_core::domain::entities::verification_code::IssuePolicy;
use otp_core::repositories::{InMemoryRetryQueue, LocalBanList, ProviderBanList, RetryQueue};
use otp_core::services::{CodeService, CodeServiceConfig, CodeStore, NotificationGateway};
use otp_shared::{
    AppConfig, CacheConfig, CacheType, NotificationConfig, ProviderConfig, ProviderKind,
    QueueBackend, RetryConfig, VerificationConfig,
};

use crate::cache::{LocalCodeStore, RedisBanList, RedisClient, RedisCodeStore};
use crate::database::{DatabasePool, MySqlRetryQueue};
use crate::sms::{
    FailoverSmsGateway, LogNotificationGateway, RetryWorker, SmsProvider, TemplateRegistry,
    TwilioSmsProvider,
};
use crate::InfrastructureError;

/// Code service over type-erased store and gateway
pub type VerificationService = CodeService<dyn CodeStore, dyn NotificationGateway>;

/// Build the code store selected by `cache.backend`
///
/// The Redis backend needs the shared `redis` client; passing `None` with
/// that backend is a configuration error.
pub fn build_code_store(
    verification: &VerificationConfig,
    cache: &CacheConfig,
    redis: Option<&RedisClient>,
) -> Result<Arc<dyn CodeStore>, InfrastructureError> {
    let policy = IssuePolicy::from_config(verification);

    match cache.backend {
        CacheType::Redis => {
            let client = redis.ok_or_else(|| {
                InfrastructureError::Config(
                    "Redis code store selected but no Redis client was provided".to_string(),
                )
            })?;
            tracing::info!(
                event = "code_store_selected",
                backend = "redis",
                "Using Redis code store"
            );
            Ok(Arc::new(RedisCodeStore::new(
                client.clone(),
                policy,
                verification.key_prefix.clone(),
            )))
        }
        CacheType::Memory => {
            tracing::warn!(
                event = "code_store_selected",
                backend = "memory",
                "Using in-process code store; only safe for a single instance"
            );
            Ok(Arc::new(LocalCodeStore::new(
                policy,
                verification.key_prefix.clone(),
                cache.local_shards,
            )))
        }
    }
}

/// Build the provider ban-list, shared through Redis when a client is given
pub fn build_ban_list(
    notification: &NotificationConfig,
    redis: Option<&RedisClient>,
) -> Arc<dyn ProviderBanList> {
    match redis {
        Some(client) => Arc::new(RedisBanList::new(
            client.clone(),
            notification.ban_key_prefix.clone(),
        )),
        None => Arc::new(LocalBanList::new()),
    }
}

/// Build the retry queue selected by `retry.backend`
pub fn build_retry_queue(
    retry: &RetryConfig,
    database: Option<&DatabasePool>,
) -> Result<Arc<dyn RetryQueue>, InfrastructureError> {
    match retry.backend {
        QueueBackend::Mysql => {
            let pool = database.ok_or_else(|| {
                InfrastructureError::Config(
                    "MySQL retry queue selected but no database pool was provided".to_string(),
                )
            })?;
            Ok(Arc::new(MySqlRetryQueue::new(pool.get_pool().clone())))
        }
        QueueBackend::Memory => {
            tracing::warn!(
                event = "retry_queue_selected",
                backend = "memory",
                "Using in-memory retry queue; queued messages are lost on restart"
            );
            Ok(Arc::new(InMemoryRetryQueue::new()))
        }
    }
}

/// Create one SMS provider from its configuration entry
pub fn build_provider(
    config: &ProviderConfig,
    templates: TemplateRegistry,
) -> Result<Arc<dyn SmsProvider>, InfrastructureError> {
    match config.kind {
        ProviderKind::Twilio => Ok(Arc::new(TwilioSmsProvider::from_provider(config, templates)?)),
        ProviderKind::Log => Ok(Arc::new(LogNotificationGateway::new(
            config.name.clone(),
            templates,
        ))),
    }
}

/// Build the failover pool over every configured provider, in order
pub fn build_notification_gateway(
    notification: &NotificationConfig,
    ban_list: Arc<dyn ProviderBanList>,
    retry_queue: Arc<dyn RetryQueue>,
) -> Result<Arc<FailoverSmsGateway>, InfrastructureError> {
    notification.validate()?;

    let templates = TemplateRegistry::new(notification.templates.clone());
    let providers = notification
        .providers
        .iter()
        .map(|provider| build_provider(provider, templates.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let gateway = FailoverSmsGateway::new(
        providers,
        ban_list,
        retry_queue,
        notification.ban_duration(),
    )
    .with_send_timeout(notification.send_timeout());
    Ok(Arc::new(gateway))
}

/// Build the code service with codes drawn from an OS-seeded generator
pub fn build_verification_service(
    verification: &VerificationConfig,
    store: Arc<dyn CodeStore>,
    gateway: Arc<dyn NotificationGateway>,
) -> Result<VerificationService, InfrastructureError> {
    verification.validate()?;
    Ok(CodeService::new(
        store,
        gateway,
        CodeServiceConfig::from(verification),
    ))
}

/// Every long-lived component of a running engine
pub struct Infrastructure {
    pub service: Arc<VerificationService>,
    pub gateway: Arc<FailoverSmsGateway>,
    pub retry_queue: Arc<dyn RetryQueue>,
    retry_config: RetryConfig,
    redis: Option<RedisClient>,
    database: Option<DatabasePool>,
}

impl Infrastructure {
    /// Connect the configured backends and wire the service
    ///
    /// Redis is contacted only for the Redis cache backend and MySQL only
    /// for the MySQL retry queue, whose migrations run here.
    pub async fn from_config(config: &AppConfig) -> Result<Self, InfrastructureError> {
        config.validate()?;

        let redis = match config.cache.backend {
            CacheType::Redis => Some(RedisClient::new(config.cache.clone()).await?),
            CacheType::Memory => None,
        };

        let database = match config.notification.retry.backend {
            QueueBackend::Mysql => {
                let pool = DatabasePool::new(config.database.clone()).await?;
                pool.run_migrations().await?;
                Some(pool)
            }
            QueueBackend::Memory => None,
        };

        let store = build_code_store(&config.verification, &config.cache, redis.as_ref())?;
        let ban_list = build_ban_list(&config.notification, redis.as_ref());
        let retry_queue = build_retry_queue(&config.notification.retry, database.as_ref())?;
        let gateway =
            build_notification_gateway(&config.notification, ban_list, retry_queue.clone())?;
        let service = build_verification_service(
            &config.verification,
            store,
            gateway.clone() as Arc<dyn NotificationGateway>,
        )?;

        tracing::info!(
            event = "infrastructure_ready",
            environment = %config.environment,
            providers = ?gateway.provider_names(),
            "Verification engine initialized"
        );

        Ok(Self {
            service: Arc::new(service),
            gateway,
            retry_queue,
            retry_config: config.notification.retry.clone(),
            redis,
            database,
        })
    }

    /// A retry worker draining this engine's queue through its gateway
    pub fn retry_worker(&self) -> RetryWorker {
        RetryWorker::new(
            self.retry_queue.clone(),
            self.gateway.clone(),
            self.retry_config.clone(),
        )
    }

    pub fn redis(&self) -> Option<&RedisClient> {
        self.redis.as_ref()
    }

    pub fn database(&self) -> Option<&DatabasePool> {
        self.database.as_ref()
    }

    /// Close the database pool, if one was opened
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.database {
            pool.close().await;
        }
        tracing::info!(event = "infrastructure_shutdown", "Verification engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otp_core::errors::CodeError;

    #[test]
    fn test_redis_store_requires_client() {
        let verification = VerificationConfig::default();
        let cache = CacheConfig::new("redis://localhost:6379");

        let result = build_code_store(&verification, &cache, None);
        assert!(matches!(result, Err(InfrastructureError::Config(_))));
    }

    #[test]
    fn test_mysql_queue_requires_pool() {
        let retry = RetryConfig {
            backend: QueueBackend::Mysql,
            ..Default::default()
        };

        let result = build_retry_queue(&retry, None);
        assert!(matches!(result, Err(InfrastructureError::Config(_))));
    }

    #[test]
    fn test_gateway_keeps_provider_order() {
        let notification = NotificationConfig {
            providers: vec![ProviderConfig::log("primary"), ProviderConfig::log("fallback")],
            ..Default::default()
        };

        let gateway = build_notification_gateway(
            &notification,
            Arc::new(LocalBanList::new()),
            Arc::new(InMemoryRetryQueue::new()),
        )
        .unwrap();
        assert_eq!(gateway.provider_names(), ["primary", "fallback"]);
        assert_eq!(gateway.send_timeout(), notification.send_timeout());
    }

    #[test]
    fn test_gateway_rejects_empty_pool() {
        let notification = NotificationConfig {
            providers: Vec::new(),
            ..Default::default()
        };

        let result = build_notification_gateway(
            &notification,
            Arc::new(LocalBanList::new()),
            Arc::new(InMemoryRetryQueue::new()),
        );
        assert!(matches!(result, Err(InfrastructureError::Validation(_))));
    }

    #[test]
    fn test_twilio_provider_requires_credentials() {
        let mut provider = ProviderConfig::log("twilio");
        provider.kind = ProviderKind::Twilio;

        assert!(build_provider(&provider, TemplateRegistry::default()).is_err());
    }

    #[tokio::test]
    async fn test_development_config_round_trip() {
        let infra = Infrastructure::from_config(&AppConfig::development())
            .await
            .unwrap();
        assert!(infra.redis().is_none());
        assert!(infra.database().is_none());

        infra.service.send("login", "13800000000").await.unwrap();
        let second = infra.service.send("login", "13800000000").await;
        assert!(matches!(
            second,
            Err(otp_core::errors::DomainError::Code(CodeError::SendTooMany))
        ));

        let report = infra.retry_worker().run_once().await.unwrap();
        assert_eq!(report.processed(), 0);
        infra.shutdown().await;
    }
}
