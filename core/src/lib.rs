//! # Verification Engine Core
//!
//! Core domain layer for the one-time verification code engine.
//! This crate contains the code state machine, the code service, the
//! ports (store, gateway, ban-list, retry queue) it depends on, and the
//! error taxonomy shared by every adapter.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
