//! Error types for code storage and notification delivery
//!
//! These classify outcomes precisely so the presentation layer can map them
//! to user-facing messages; no layer below it retries or reclassifies.

use thiserror::Error;

/// Outcomes of issuing or checking a verification code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// A code for this key was issued less than one cooldown window ago
    #[error("Verification code requested too frequently")]
    SendTooMany,

    /// The remaining attempts for the current code are used up
    #[error("Too many failed verification attempts")]
    VerifyTooManyTimes,

    /// The supplied code does not match
    #[error("Verification code does not match")]
    VerifyFailed,

    /// No live code for the key, or the store answered something unexpected
    #[error("Unknown verification state")]
    Unknown,

    /// Transport or serialization failure talking to the store
    #[error("Code storage failure: {message}")]
    Storage { message: String },

    /// The caller's deadline elapsed before the store answered
    #[error("Code storage operation timed out")]
    Timeout,
}

impl CodeError {
    pub fn storage(message: impl Into<String>) -> Self {
        CodeError::Storage {
            message: message.into(),
        }
    }
}

/// Failures while delivering a templated notification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Every configured provider is currently banned
    #[error("No available SMS provider")]
    NoAvailableProvider,

    /// The vendor rejected the message or could not be reached
    #[error("SMS provider {provider} failed: {reason}")]
    SendFailed { provider: String, reason: String },

    /// The shared ban-list could not be read or written
    #[error("Provider ban-list failure: {message}")]
    BanList { message: String },

    /// A failed delivery could not be queued for retry
    #[error("Retry queue failure: {message}")]
    RetryQueue { message: String },

    /// Template missing or arguments incomplete
    #[error("Template error: {message}")]
    Template { message: String },

    /// The caller's deadline elapsed before delivery finished
    #[error("Notification delivery timed out")]
    Timeout,
}

impl NotifyError {
    pub fn send_failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        NotifyError::SendFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn ban_list(message: impl Into<String>) -> Self {
        NotifyError::BanList {
            message: message.into(),
        }
    }

    pub fn retry_queue(message: impl Into<String>) -> Self {
        NotifyError::RetryQueue {
            message: message.into(),
        }
    }
}
