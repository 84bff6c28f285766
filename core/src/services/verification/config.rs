//! Configuration for the code service

use std::time::Duration;

use otp_shared::VerificationConfig;

/// Settings the code service needs beyond what the store enforces
#[derive(Debug, Clone)]
pub struct CodeServiceConfig {
    /// Number of digits in a generated code
    pub code_length: u32,
    /// Template used for the outgoing message
    pub template_id: String,
    /// Code lifetime shown in the message, from
    /// [`VerificationConfig::expiry_minutes`]
    pub expiry_minutes: u64,
    /// Deadline applied to each send or verify call
    pub operation_timeout: Duration,
}

impl From<&VerificationConfig> for CodeServiceConfig {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            code_length: config.code_length,
            template_id: config.template_id.clone(),
            expiry_minutes: config.expiry_minutes(),
            operation_timeout: config.operation_timeout(),
        }
    }
}

impl Default for CodeServiceConfig {
    fn default() -> Self {
        Self::from(&VerificationConfig::default())
    }
}
