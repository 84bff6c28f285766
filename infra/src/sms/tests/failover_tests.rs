//! Unit tests for the failover SMS gateway

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use otp_core::domain::entities::notification::{NamedArg, NewRetryTask, RetryTask};
use otp_core::errors::NotifyError;
use otp_core::repositories::{InMemoryRetryQueue, LocalBanList, ProviderBanList, RetryQueue};
use otp_core::services::NotificationGateway;

use crate::sms::{FailoverSmsGateway, LogNotificationGateway, SmsProvider, TemplateRegistry};

const BAN: Duration = Duration::from_secs(300);

struct Pool {
    a: Arc<LogNotificationGateway>,
    b: Arc<LogNotificationGateway>,
    bans: Arc<LocalBanList>,
    queue: Arc<InMemoryRetryQueue>,
    gateway: FailoverSmsGateway,
}

fn provider(name: &str) -> Arc<LogNotificationGateway> {
    Arc::new(LogNotificationGateway::new(
        name,
        TemplateRegistry::default().with_template("1", "Code {code}"),
    ))
}

fn pool() -> Pool {
    let a = provider("aliyun");
    let b = provider("tencent");
    let bans = Arc::new(LocalBanList::new());
    let queue = Arc::new(InMemoryRetryQueue::new());
    let providers: Vec<Arc<dyn SmsProvider>> = vec![a.clone(), b.clone()];
    let gateway = FailoverSmsGateway::new(providers, bans.clone(), queue.clone(), BAN);
    Pool {
        a,
        b,
        bans,
        queue,
        gateway,
    }
}

fn args() -> Vec<NamedArg> {
    vec![NamedArg::new("code", "1234")]
}

fn to() -> Vec<String> {
    vec!["13800000000".to_string()]
}

#[tokio::test]
async fn test_first_available_provider_is_used() {
    let pool = pool();

    pool.gateway.send("1", &args(), &to()).await.unwrap();

    assert_eq!(pool.a.message_count(), 1);
    assert_eq!(pool.b.message_count(), 0);
    assert!(pool.queue.tasks().is_empty());
}

#[tokio::test]
async fn test_failure_bans_provider_and_enqueues_retry() {
    let pool = pool();
    pool.a.set_simulate_failure(true);

    let result = pool.gateway.send("1", &args(), &to()).await;
    match result {
        Err(NotifyError::SendFailed { provider, .. }) => assert_eq!(provider, "aliyun"),
        other => panic!("Expected SendFailed, got {:?}", other),
    }

    let banned = pool
        .bans
        .banned_among(pool.gateway.provider_names())
        .await
        .unwrap();
    assert!(banned.contains("aliyun"));

    let tasks = pool.queue.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].template_id, "1");
    assert_eq!(tasks[0].args, args());
    assert_eq!(tasks[0].recipients, to());

    // Next message routes to the next provider in order
    pool.gateway.send("1", &args(), &to()).await.unwrap();
    assert_eq!(pool.b.message_count(), 1);
}

#[tokio::test]
async fn test_all_banned_yields_no_available_provider() {
    let pool = pool();
    pool.bans.ban("aliyun", BAN).await.unwrap();
    pool.bans.ban("tencent", BAN).await.unwrap();

    let result = pool.gateway.send("1", &args(), &to()).await;

    assert_eq!(result, Err(NotifyError::NoAvailableProvider));
    assert!(pool.queue.tasks().is_empty());
    assert_eq!(pool.a.message_count() + pool.b.message_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_banned_provider_returns_after_ban_expires() {
    let pool = pool();
    pool.a.set_simulate_failure(true);
    pool.gateway.send("1", &args(), &to()).await.unwrap_err();
    pool.a.set_simulate_failure(false);

    pool.gateway.send("1", &args(), &to()).await.unwrap();
    assert_eq!(pool.b.message_count(), 1);

    tokio::time::advance(BAN).await;

    pool.gateway.send("1", &args(), &to()).await.unwrap();
    assert_eq!(pool.a.message_count(), 1);
}

#[tokio::test]
async fn test_deliver_does_not_enqueue() {
    let pool = pool();
    pool.a.set_simulate_failure(true);

    let result = pool.gateway.deliver("1", &args(), &to()).await;

    assert!(matches!(result, Err(NotifyError::SendFailed { .. })));
    assert!(pool.queue.tasks().is_empty());
}

struct BrokenQueue;

#[async_trait]
impl RetryQueue for BrokenQueue {
    async fn enqueue(&self, _task: NewRetryTask) -> Result<u64, NotifyError> {
        Err(NotifyError::retry_queue("database unavailable"))
    }

    async fn fetch_due(&self, _limit: usize) -> Result<Vec<RetryTask>, NotifyError> {
        Ok(Vec::new())
    }

    async fn mark_succeeded(&self, _id: u64) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn record_failure(&self, _id: u64, _error: &str, _abandon: bool) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_enqueue_failure_is_reported() {
    let a = provider("aliyun");
    a.set_simulate_failure(true);
    let providers: Vec<Arc<dyn SmsProvider>> = vec![a];
    let gateway = FailoverSmsGateway::new(
        providers,
        Arc::new(LocalBanList::new()),
        Arc::new(BrokenQueue),
        BAN,
    );

    let result = gateway.send("1", &args(), &to()).await;

    assert!(matches!(result, Err(NotifyError::RetryQueue { .. })));
}

/// Provider that never answers within any reasonable deadline
struct HungProvider;

#[async_trait]
impl SmsProvider for HungProvider {
    fn provider_name(&self) -> &str {
        "hung"
    }

    async fn send(
        &self,
        _template_id: &str,
        _args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, crate::InfrastructureError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(recipients.iter().map(|_| "late".to_string()).collect())
    }
}

struct HungPool {
    fallback: Arc<LogNotificationGateway>,
    bans: Arc<LocalBanList>,
    queue: Arc<InMemoryRetryQueue>,
    gateway: Arc<FailoverSmsGateway>,
}

fn hung_pool() -> HungPool {
    let fallback = provider("fallback");
    let bans = Arc::new(LocalBanList::new());
    let queue = Arc::new(InMemoryRetryQueue::new());
    let providers: Vec<Arc<dyn SmsProvider>> = vec![Arc::new(HungProvider), fallback.clone()];
    let gateway = Arc::new(FailoverSmsGateway::new(
        providers,
        bans.clone(),
        queue.clone(),
        BAN,
    ));
    HungPool {
        fallback,
        bans,
        queue,
        gateway,
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_provider_is_banned_within_code_service_deadline() {
    use otp_core::errors::DomainError;
    use otp_core::services::{CodeService, CodeServiceConfig};

    use crate::cache::LocalCodeStore;
    use otp_core::domain::entities::verification_code::IssuePolicy;

    let pool = hung_pool();
    assert!(crate::sms::DEFAULT_SEND_TIMEOUT < CodeServiceConfig::default().operation_timeout);
    let store = Arc::new(LocalCodeStore::new(IssuePolicy::default(), "phone_code", 4));
    let service = CodeService::new(store, pool.gateway.clone(), CodeServiceConfig::default());

    let first = service.send("login", "13800000001").await;
    assert!(matches!(
        first,
        Err(DomainError::Notify(NotifyError::SendFailed { ref provider, .. })) if provider == "hung"
    ));

    let banned = pool
        .bans
        .banned_among(pool.gateway.provider_names())
        .await
        .unwrap();
    assert!(banned.contains("hung"));
    assert_eq!(pool.queue.tasks().len(), 1);

    service.send("login", "13800000002").await.unwrap();
    service.send("login", "13800000003").await.unwrap();
    assert_eq!(pool.fallback.message_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_caller_giving_up_does_not_cancel_ban_or_enqueue() {
    let pool = hung_pool();

    let gave_up =
        tokio::time::timeout(Duration::from_millis(500), pool.gateway.send("1", &args(), &to()))
            .await;
    assert!(gave_up.is_err());

    tokio::time::sleep(crate::sms::DEFAULT_SEND_TIMEOUT).await;

    let banned = pool
        .bans
        .banned_among(pool.gateway.provider_names())
        .await
        .unwrap();
    assert!(banned.contains("hung"));
    assert_eq!(pool.queue.tasks().len(), 1);
    assert_eq!(pool.queue.tasks()[0].recipients, to());
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout_is_configurable() {
    let pool = hung_pool();
    let fallback = provider("fallback");
    let providers: Vec<Arc<dyn SmsProvider>> = vec![Arc::new(HungProvider), fallback.clone()];
    let gateway = FailoverSmsGateway::new(providers, pool.bans.clone(), pool.queue.clone(), BAN)
        .with_send_timeout(Duration::from_millis(100));

    let started = tokio::time::Instant::now();
    gateway.deliver("1", &args(), &to()).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1));
    gateway.deliver("1", &args(), &to()).await.unwrap();
    assert_eq!(fallback.message_count(), 1);
}

/// Provider that rejects one specific recipient
struct RejectsRecipient {
    name: String,
    rejected: String,
    accepted: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl SmsProvider for RejectsRecipient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        _template_id: &str,
        _args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, crate::InfrastructureError> {
        let mut accepted = self.accepted.lock().unwrap();
        for recipient in recipients {
            if *recipient == self.rejected {
                return Err(crate::InfrastructureError::Sms("invalid number".to_string()));
            }
            accepted.push(recipient.clone());
        }
        Ok(recipients.to_vec())
    }
}

#[tokio::test]
async fn test_multi_recipient_failure_queues_only_undelivered() {
    let primary = Arc::new(RejectsRecipient {
        name: "primary".to_string(),
        rejected: "13800000002".to_string(),
        accepted: std::sync::Mutex::new(Vec::new()),
    });
    let fallback = provider("fallback");
    let queue = Arc::new(InMemoryRetryQueue::new());
    let providers: Vec<Arc<dyn SmsProvider>> = vec![primary.clone(), fallback.clone()];
    let gateway =
        FailoverSmsGateway::new(providers, Arc::new(LocalBanList::new()), queue.clone(), BAN);

    let recipients: Vec<String> = ["13800000001", "13800000002", "13800000003"]
        .iter()
        .map(|r| r.to_string())
        .collect();
    let result = gateway.send("1", &args(), &recipients).await;

    assert!(matches!(result, Err(NotifyError::SendFailed { .. })));
    assert_eq!(*primary.accepted.lock().unwrap(), ["13800000001"]);
    assert_eq!(fallback.message_count(), 1);

    let tasks = queue.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].recipients, ["13800000002"]);
}
