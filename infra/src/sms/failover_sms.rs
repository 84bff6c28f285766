//! Failover SMS Gateway
//!
//! Routes each message to the first provider, in configured order, that is
//! not on the shared ban-list. A provider that fails, or does not answer
//! within the send timeout, is banned for the configured duration and the
//! message is queued for the retry worker.
//!
//! ## Provider lifecycle
//!
//! - `Available -> Banned` when a delivery through it fails or times out
//! - `Banned -> Available` once the ban expires; checked lazily at selection
//!
//! ## Cancellation
//!
//! [`NotificationGateway::send`] runs on a spawned task. A caller that
//! stops waiting (for example on its own deadline) does not cancel the ban
//! or the enqueue of a failed message.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use otp_core::domain::entities::notification::{NamedArg, NewRetryTask};
use otp_core::errors::NotifyError;
use otp_core::repositories::{ProviderBanList, RetryQueue};
use otp_core::services::NotificationGateway;
use otp_shared::phone::mask_phone_number;

use super::sms_service::SmsProvider;

/// Time one provider gets to accept a message unless configured otherwise
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Notification gateway over an ordered pool of providers
pub struct FailoverSmsGateway {
    pool: Arc<ProviderPool>,
    send_timeout: Duration,
}

struct ProviderPool {
    providers: Vec<Arc<dyn SmsProvider>>,
    names: Vec<String>,
    ban_list: Arc<dyn ProviderBanList>,
    retry_queue: Arc<dyn RetryQueue>,
    ban_duration: Duration,
}

impl FailoverSmsGateway {
    /// Create a failover gateway
    ///
    /// # Arguments
    ///
    /// * `providers` - Providers in preference order
    /// * `ban_list` - Shared record of banned providers
    /// * `retry_queue` - Where failed messages are queued
    /// * `ban_duration` - How long a failing provider stays out of rotation
    pub fn new(
        providers: Vec<Arc<dyn SmsProvider>>,
        ban_list: Arc<dyn ProviderBanList>,
        retry_queue: Arc<dyn RetryQueue>,
        ban_duration: Duration,
    ) -> Self {
        let names: Vec<String> = providers
            .iter()
            .map(|provider| provider.provider_name().to_string())
            .collect();

        info!(providers = ?names, "Initializing failover SMS gateway");

        Self {
            pool: Arc::new(ProviderPool {
                providers,
                names,
                ban_list,
                retry_queue,
                ban_duration,
            }),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Bound each provider call; a provider that exceeds it counts as failed
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Provider names in preference order
    pub fn provider_names(&self) -> &[String] {
        &self.pool.names
    }

    /// First provider that is not currently banned
    pub async fn select(&self) -> Result<Arc<dyn SmsProvider>, NotifyError> {
        self.pool.select().await
    }

    /// Deliver through the pool without queuing on failure
    ///
    /// All `recipients` go to one provider in one call. A failing provider
    /// is still banned. The retry worker uses this so redelivery never
    /// enqueues a duplicate task.
    pub async fn deliver(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.pool
            .deliver(template_id, args, recipients, self.send_timeout)
            .await
    }
}

impl ProviderPool {
    async fn select(&self) -> Result<Arc<dyn SmsProvider>, NotifyError> {
        let banned = self.ban_list.banned_among(&self.names).await?;

        self.providers
            .iter()
            .zip(&self.names)
            .find(|(_, name)| !banned.contains(name.as_str()))
            .map(|(provider, _)| provider.clone())
            .ok_or_else(|| {
                warn!(banned = banned.len(), event = "sms_no_provider", "All SMS providers are banned");
                NotifyError::NoAvailableProvider
            })
    }

    async fn deliver(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
        send_timeout: Duration,
    ) -> Result<(), NotifyError> {
        let provider = self.select().await?;
        let name = provider.provider_name().to_string();

        let reason = match tokio::time::timeout(
            send_timeout,
            provider.send(template_id, args, recipients),
        )
        .await
        {
            Ok(Ok(ids)) => {
                debug!(provider = %name, messages = ids.len(), "SMS delivered");
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no response within {}ms", send_timeout.as_millis()),
        };

        error!(
            provider = %name,
            recipients = %mask_recipients(recipients),
            error = %reason,
            event = "sms_send_failed",
            "SMS provider failed"
        );
        self.ban(&name).await;
        Err(NotifyError::send_failed(name, reason))
    }

    /// Deliver to each recipient separately, queuing the ones that failed
    ///
    /// Every queued task carries exactly one recipient, so a retry never
    /// repeats a message another recipient already received.
    async fn send_each(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
        send_timeout: Duration,
    ) -> Result<(), NotifyError> {
        let mut first_error = None;

        for recipient in recipients {
            let single = std::slice::from_ref(recipient);
            let send_error = match self.deliver(template_id, args, single, send_timeout).await {
                Ok(()) => continue,
                Err(send_error @ NotifyError::SendFailed { .. }) => send_error,
                Err(other) => return Err(first_error.unwrap_or(other)),
            };

            let task = NewRetryTask::new(template_id, args, single);
            let reported = match self.retry_queue.enqueue(task).await {
                Ok(id) => {
                    info!(task_id = id, event = "sms_retry_enqueued", "Queued SMS for retry");
                    send_error
                }
                Err(queue_error) => {
                    error!(
                        error = %queue_error,
                        send_error = %send_error,
                        event = "sms_retry_enqueue_failed",
                        "Failed to queue SMS for retry"
                    );
                    queue_error
                }
            };
            first_error.get_or_insert(reported);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn ban(&self, name: &str) {
        match self.ban_list.ban(name, self.ban_duration).await {
            Ok(true) => warn!(
                provider = name,
                ban_seconds = self.ban_duration.as_secs(),
                event = "sms_provider_banned",
                "SMS provider removed from rotation"
            ),
            Ok(false) => debug!(provider = name, "SMS provider already banned"),
            // The send error is what the caller needs to see
            Err(e) => error!(provider = name, error = %e, "Failed to ban SMS provider"),
        }
    }
}

fn mask_recipients(recipients: &[String]) -> String {
    recipients
        .iter()
        .map(|r| mask_phone_number(r))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl NotificationGateway for FailoverSmsGateway {
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let pool = self.pool.clone();
        let send_timeout = self.send_timeout;
        let template_id = template_id.to_string();
        let args = args.to_vec();
        let recipients = recipients.to_vec();

        let delivery = tokio::spawn(async move {
            pool.send_each(&template_id, &args, &recipients, send_timeout)
                .await
        });

        delivery.await.map_err(|e| {
            error!(error = %e, event = "sms_delivery_task_failed", "SMS delivery task did not finish");
            NotifyError::send_failed("failover", e.to_string())
        })?
    }
}
