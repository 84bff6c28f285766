//! Verification code configuration module

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigError;

/// Default lifetime of an issued code (10 minutes)
pub const DEFAULT_CODE_TTL_SECONDS: u64 = 600;

/// Default minimum interval between two issues for the same key
pub const DEFAULT_RESEND_COOLDOWN_SECONDS: u64 = 60;

/// Default number of mismatches tolerated per code
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default number of digits in a code
pub const DEFAULT_CODE_LENGTH: u32 = 4;

/// Verification code issuing and checking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// Total lifetime `T` of a code in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_seconds: u64,

    /// Cooldown window `C` in seconds; a key cannot be re-issued while
    /// its record is younger than this
    #[serde(default = "default_cooldown")]
    pub resend_cooldown_seconds: u64,

    /// Mismatches allowed before the code is locked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Number of digits in a generated code
    #[serde(default = "default_code_length")]
    pub code_length: u32,

    /// Key prefix for stored records
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Provider-side template used for code messages
    #[serde(default = "default_template_id")]
    pub template_id: String,

    /// Deadline applied to each store/gateway call, in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl_seconds: default_code_ttl(),
            resend_cooldown_seconds: default_cooldown(),
            max_attempts: default_max_attempts(),
            code_length: default_code_length(),
            key_prefix: default_key_prefix(),
            template_id: default_template_id(),
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

impl VerificationConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            code_ttl_seconds: env_parse("OTP_CODE_TTL_SECONDS", defaults.code_ttl_seconds),
            resend_cooldown_seconds: env_parse(
                "OTP_RESEND_COOLDOWN_SECONDS",
                defaults.resend_cooldown_seconds,
            ),
            max_attempts: env_parse("OTP_MAX_ATTEMPTS", defaults.max_attempts),
            code_length: env_parse("OTP_CODE_LENGTH", defaults.code_length),
            key_prefix: std::env::var("OTP_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            template_id: std::env::var("OTP_TEMPLATE_ID").unwrap_or(defaults.template_id),
            operation_timeout_ms: env_parse(
                "OTP_OPERATION_TIMEOUT_MS",
                defaults.operation_timeout_ms,
            ),
        }
    }

    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_seconds)
    }

    pub fn resend_cooldown(&self) -> Duration {
        Duration::from_secs(self.resend_cooldown_seconds)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Code lifetime in whole minutes, rounded up, as shown to recipients
    pub fn expiry_minutes(&self) -> u64 {
        self.code_ttl_seconds.div_ceil(60)
    }

    /// Check that the values describe a usable issue policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_ttl_seconds == 0 {
            return Err(ConfigError::invalid("code_ttl_seconds", "must be positive"));
        }
        if self.resend_cooldown_seconds >= self.code_ttl_seconds {
            return Err(ConfigError::invalid(
                "resend_cooldown_seconds",
                "must be shorter than code_ttl_seconds",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if !(1..=9).contains(&self.code_length) {
            return Err(ConfigError::invalid("code_length", "must be between 1 and 9"));
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigError::missing("key_prefix"));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::invalid("operation_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_code_ttl() -> u64 {
    DEFAULT_CODE_TTL_SECONDS
}

fn default_cooldown() -> u64 {
    DEFAULT_RESEND_COOLDOWN_SECONDS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_code_length() -> u32 {
    DEFAULT_CODE_LENGTH
}

fn default_key_prefix() -> String {
    "phone_code".to_string()
}

fn default_template_id() -> String {
    "1".to_string()
}

fn default_operation_timeout() -> u64 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = VerificationConfig::default();
        assert_eq!(config.code_ttl(), Duration::from_secs(600));
        assert_eq!(config.resend_cooldown(), Duration::from_secs(60));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.code_length, 4);
        assert_eq!(config.expiry_minutes(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expiry_minutes_rounds_up() {
        let config = VerificationConfig {
            code_ttl_seconds: 90,
            resend_cooldown_seconds: 30,
            ..Default::default()
        };
        assert_eq!(config.expiry_minutes(), 2);
    }

    #[test]
    fn test_cooldown_must_be_shorter_than_ttl() {
        let config = VerificationConfig {
            code_ttl_seconds: 60,
            resend_cooldown_seconds: 60,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "resend_cooldown_seconds"
        ));
    }

    #[test]
    fn test_rejects_zero_attempts_and_wide_codes() {
        let zero_attempts = VerificationConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(zero_attempts.validate().is_err());

        let wide = VerificationConfig {
            code_length: 10,
            ..Default::default()
        };
        assert!(wide.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: VerificationConfig =
            serde_json::from_str(r#"{"code_ttl_seconds": 300}"#).unwrap();
        assert_eq!(config.code_ttl_seconds, 300);
        assert_eq!(config.resend_cooldown_seconds, 60);
        assert_eq!(config.key_prefix, "phone_code");
    }
}
