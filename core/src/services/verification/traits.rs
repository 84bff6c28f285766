//! Traits for code storage and notification delivery

use async_trait::async_trait;

use crate::domain::entities::notification::NamedArg;
use crate::errors::{CodeError, NotifyError};

/// Atomic store of pending verification codes
///
/// Both operations are single indivisible steps per `(business, recipient)`
/// key, so concurrent callers never observe or produce a half-applied
/// state. Implementations never retry.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Issue `code` for the key, subject to the resend cooldown
    ///
    /// # Returns
    /// * `Ok(())` - Record created or replaced with a full attempt budget
    /// * `Err(CodeError::SendTooMany)` - Previous code is still in cooldown
    /// * `Err(CodeError::Unknown)` - Key exists without an expiry
    async fn set(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError>;

    /// Check `code` against the live record for the key
    ///
    /// # Returns
    /// * `Ok(())` - Code matched; the record is consumed
    /// * `Err(CodeError::VerifyFailed)` - Mismatch; one attempt used
    /// * `Err(CodeError::VerifyTooManyTimes)` - No attempts left
    /// * `Err(CodeError::Unknown)` - No live record
    async fn verify(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError>;
}

/// Sends a templated message to one or more recipients
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError>;
}
