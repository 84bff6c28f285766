//! Shared utilities and common types for the Yellowbook verification engine
//!
//! This crate provides common functionality used across all engine crates:
//! - Configuration types for codes, cache, SMS providers and logging
//! - Configuration error type
//! - Utility functions (recipient masking, phone validation)

pub mod config;
pub mod errors;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CacheConfig, CacheType, DatabaseConfig, Environment, LogFormat, LoggingConfig,
    NotificationConfig, ProviderConfig, ProviderKind, QueueBackend, RetryConfig,
    VerificationConfig,
};
pub use errors::ConfigError;
pub use utils::phone;
