//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for the verification code
//! engine. It provides the concrete adapters behind the ports declared in
//! `otp_core`.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Cache**: Redis client, the Lua-backed code store, the Redis ban-list
//!   and the single-process in-memory code store
//! - **SMS**: provider clients, the failover pool and the retry worker
//! - **Database**: MySQL retry queue using SQLx
//! - **Bootstrap**: configuration loading, logging and wiring helpers

// Re-export core types for convenience
pub use otp_core::errors::*;

/// Wiring helpers that assemble services from configuration
pub mod bootstrap;

/// Cache module - Redis client and code stores
pub mod cache;

/// Configuration loading for infrastructure services
pub mod config;

/// Database module - MySQL implementations using SQLx
pub mod database;

/// Tracing subscriber setup
pub mod logging;

/// SMS service module - External SMS providers and failover
pub mod sms;

pub use bootstrap::{
    build_ban_list, build_code_store, build_notification_gateway, build_provider,
    build_retry_queue, build_verification_service, Infrastructure, VerificationService,
};
pub use config::load_config;
pub use logging::init_tracing;

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Settings(#[from] ::config::ConfigError),

    /// Loaded configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    Validation(#[from] otp_shared::ConfigError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SMS service error
    #[error("SMS service error: {0}")]
    Sms(String),
}
