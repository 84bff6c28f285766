//! Logging SMS Provider
//!
//! Development stand-in for a real vendor: renders the message, writes it
//! to the log with the recipient masked and keeps a copy for inspection.
//! It can also be told to fail, which makes it useful in failover tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use otp_core::domain::entities::notification::NamedArg;
use otp_core::errors::NotifyError;
use otp_core::services::NotificationGateway;
use otp_shared::phone::mask_phone_number;

use super::sms_service::SmsProvider;
use super::template::TemplateRegistry;
use crate::InfrastructureError;

/// A message accepted by the logging provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub message_id: String,
    pub recipient: String,
    pub body: String,
}

/// Notification gateway and SMS provider that only logs
pub struct LogNotificationGateway {
    name: String,
    templates: TemplateRegistry,
    message_count: AtomicU64,
    simulate_failure: AtomicBool,
    delivered: Mutex<Vec<LoggedMessage>>,
}

impl LogNotificationGateway {
    pub fn new(name: impl Into<String>, templates: TemplateRegistry) -> Self {
        Self {
            name: name.into(),
            templates,
            message_count: AtomicU64::new(0),
            simulate_failure: AtomicBool::new(false),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_simulate_failure(&self, simulate: bool) {
        self.simulate_failure.store(simulate, Ordering::SeqCst);
    }

    /// Total number of messages accepted
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// Messages accepted so far, oldest first
    pub fn delivered(&self) -> Vec<LoggedMessage> {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn deliver(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, NotifyError> {
        if self.simulate_failure.load(Ordering::SeqCst) {
            warn!(provider = %self.name, "Simulating SMS delivery failure");
            return Err(NotifyError::send_failed(&self.name, "simulated failure"));
        }

        let body = self.templates.render(template_id, args)?;
        let mut ids = Vec::with_capacity(recipients.len());
        let mut delivered = self
            .delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for recipient in recipients {
            let sequence = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;
            let message_id = format!("{}-{}", self.name, sequence);
            info!(
                provider = %self.name,
                recipient = %mask_phone_number(recipient),
                template_id = template_id,
                message_id = %message_id,
                event = "sms_logged",
                "SMS message logged instead of sent"
            );
            delivered.push(LoggedMessage {
                message_id: message_id.clone(),
                recipient: recipient.clone(),
                body: body.clone(),
            });
            ids.push(message_id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl SmsProvider for LogNotificationGateway {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, InfrastructureError> {
        self.deliver(template_id, args, recipients)
            .map_err(|e| InfrastructureError::Sms(e.to_string()))
    }
}

#[async_trait]
impl NotificationGateway for LogNotificationGateway {
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.deliver(template_id, args, recipients).map(|_| ())
    }
}
