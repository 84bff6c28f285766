//! SMS Provider Interface
//!
//! Defines the trait for vendor clients that deliver one templated message.
//! Providers report failures as `InfrastructureError`; the gateways in this
//! module translate them into `NotifyError`.

use async_trait::async_trait;

use otp_core::domain::entities::notification::NamedArg;

use crate::InfrastructureError;

/// A vendor client able to deliver a templated message
///
/// Implementations include:
/// - Twilio REST API
/// - Logging provider for development
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Name the provider is configured and banned under
    fn provider_name(&self) -> &str;

    /// Deliver `template_id` rendered with `args` to every recipient
    ///
    /// # Returns
    ///
    /// * `Ok(message_ids)` - One vendor message id per recipient
    /// * `Err(InfrastructureError)` - If the vendor rejected the message or
    ///   could not be reached; earlier recipients may already have been sent to
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, InfrastructureError>;
}
