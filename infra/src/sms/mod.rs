//! SMS Service Module
//!
//! This module provides SMS delivery for verification codes:
//! - `SmsProvider` trait implemented by vendor clients
//! - Twilio REST provider and a logging provider for development
//! - Single-provider and failover notification gateways
//! - Retry worker draining the queue of failed deliveries

pub mod failover_sms;
pub mod log_sms;
pub mod provider_gateway;
pub mod retry_worker;
pub mod sms_service;
pub mod template;
pub mod twilio;

#[cfg(test)]
mod tests;

pub use failover_sms::{FailoverSmsGateway, DEFAULT_SEND_TIMEOUT};
pub use log_sms::{LogNotificationGateway, LoggedMessage};
pub use provider_gateway::SingleProviderGateway;
pub use retry_worker::{RetryReport, RetryWorker};
pub use sms_service::SmsProvider;
pub use template::TemplateRegistry;
pub use twilio::{TwilioConfig, TwilioSmsProvider};
