//! Verification code service
//!
//! This module provides the verification code workflow:
//! - Code generation from an injectable random source
//! - Issuing codes through an atomic code store
//! - Delivery through a notification gateway
//! - Code checks with a bounded attempt budget

mod config;
mod service;
mod traits;

#[cfg(test)]
mod tests;

pub use config::CodeServiceConfig;
pub use service::CodeService;
pub use traits::{CodeStore, NotificationGateway};
