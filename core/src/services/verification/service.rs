//! Code service: issues, delivers and checks verification codes

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout_at, Instant};

use otp_shared::phone::mask_phone_number;

use crate::domain::entities::notification::NamedArg;
use crate::errors::{CodeError, DomainResult, NotifyError};

use super::config::CodeServiceConfig;
use super::traits::{CodeStore, NotificationGateway};

/// Issues codes through a [`CodeStore`] and delivers them through a
/// [`NotificationGateway`]
pub struct CodeService<S: CodeStore + ?Sized, G: NotificationGateway + ?Sized> {
    store: Arc<S>,
    gateway: Arc<G>,
    config: CodeServiceConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl<S: CodeStore + ?Sized, G: NotificationGateway + ?Sized> CodeService<S, G> {
    /// Create a code service drawing codes from an OS-seeded generator
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: CodeServiceConfig) -> Self {
        Self::with_rng(store, gateway, config, StdRng::from_entropy())
    }

    /// Create a code service with an explicit random source
    ///
    /// Tests pass a seeded generator to get reproducible codes.
    pub fn with_rng<R>(store: Arc<S>, gateway: Arc<G>, config: CodeServiceConfig, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self {
            store,
            gateway,
            config,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn config(&self) -> &CodeServiceConfig {
        &self.config
    }

    /// Uniform fixed-width numeric code, zero-padded on the left
    pub fn generate_code(&self) -> String {
        let width = self.config.code_length;
        let upper = 10u64.pow(width);
        let value = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(0..upper)
        };
        format!("{:0width$}", value, width = width as usize)
    }

    /// Issue a fresh code for `recipient` and send it
    ///
    /// Nothing is sent when the store refuses the code; its error is
    /// returned unchanged.
    pub async fn send(&self, business: &str, recipient: &str) -> DomainResult<()> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let masked = mask_phone_number(recipient);
        let code = self.generate_code();

        within(deadline, CodeError::Timeout, self.store.set(business, recipient, &code))
            .await
            .map_err(|e| {
                tracing::warn!(
                    business = business,
                    recipient = %masked,
                    error = %e,
                    event = "code_issue_rejected",
                    "Verification code was not issued"
                );
                e
            })?;

        tracing::info!(
            business = business,
            recipient = %masked,
            event = "code_issued",
            "Issued verification code"
        );

        let args = [
            NamedArg::new("code", code),
            NamedArg::new("expiry", self.config.expiry_minutes.to_string()),
        ];
        let recipients = [recipient.to_string()];

        within(
            deadline,
            NotifyError::Timeout,
            self.gateway
                .send(&self.config.template_id, &args, &recipients),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                business = business,
                recipient = %masked,
                error = %e,
                event = "code_delivery_failed",
                "Failed to deliver verification code"
            );
            e
        })?;

        tracing::debug!(
            business = business,
            recipient = %masked,
            event = "code_delivered",
            "Verification code handed to gateway"
        );
        Ok(())
    }

    /// Check a code supplied by `recipient`
    pub async fn verify(&self, business: &str, recipient: &str, code: &str) -> DomainResult<()> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let masked = mask_phone_number(recipient);

        match within(deadline, CodeError::Timeout, self.store.verify(business, recipient, code)).await
        {
            Ok(()) => {
                tracing::info!(
                    business = business,
                    recipient = %masked,
                    event = "code_verified",
                    "Verification code accepted"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    business = business,
                    recipient = %masked,
                    error = %e,
                    event = "code_verify_failed",
                    "Verification code rejected"
                );
                Err(e.into())
            }
        }
    }
}

async fn within<T, E, F>(deadline: Instant, elapsed: E, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    timeout_at(deadline, fut).await.unwrap_or(Err(elapsed))
}
