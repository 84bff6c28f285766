//! Domain-specific error types and error handling.

mod types;

pub use types::{CodeError, NotifyError};

use otp_shared::ConfigError;
use thiserror::Error;

/// Core domain errors (general purpose)
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },

    // Bridge to specific error types
    #[error(transparent)]
    Code(#[from] CodeError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub type DomainResult<T> = Result<T, DomainError>;
