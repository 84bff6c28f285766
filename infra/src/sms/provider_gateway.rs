//! Gateway over a single SMS provider

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use otp_core::domain::entities::notification::NamedArg;
use otp_core::errors::NotifyError;
use otp_core::services::NotificationGateway;

use super::sms_service::SmsProvider;

/// Sends through exactly one provider; any vendor failure becomes
/// `NotifyError::SendFailed` and nothing is retried
pub struct SingleProviderGateway<P: SmsProvider + ?Sized> {
    provider: Arc<P>,
}

impl<P: SmsProvider + ?Sized> SingleProviderGateway<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }
}

#[async_trait]
impl<P: SmsProvider + ?Sized> NotificationGateway for SingleProviderGateway<P> {
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        match self.provider.send(template_id, args, recipients).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let name = self.provider.provider_name();
                warn!(provider = name, error = %e, event = "sms_send_failed", "SMS provider failed");
                Err(NotifyError::send_failed(name, e.to_string()))
            }
        }
    }
}
