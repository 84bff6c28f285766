//! SMS provider, failover and retry configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::ConfigError;

/// Kind of vendor behind a configured provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Twilio REST API
    Twilio,
    /// Log-only provider for development
    Log,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "twilio" => Ok(ProviderKind::Twilio),
            "log" | "mock" | "memory" => Ok(ProviderKind::Log),
            _ => Err(format!("Invalid SMS provider kind: {}", s)),
        }
    }
}

/// One entry of the ordered provider list
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Unique provider name, also used as the ban-list key
    pub name: String,

    pub kind: ProviderKind,

    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    /// Sender number in E.164 format
    #[serde(default)]
    pub from_number: String,

    /// Override for the vendor API base URL
    #[serde(default)]
    pub api_base: Option<String>,

    /// Timeout for a single vendor request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    /// A log-only provider, handy for development pools
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::Log,
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: None,
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Load a provider named `name` from `SMS_<NAME>_*` variables
    pub fn from_env(name: &str) -> Result<Self, ConfigError> {
        let var_prefix = format!("SMS_{}", name.to_uppercase().replace('-', "_"));
        let var = |suffix: &str| std::env::var(format!("{}_{}", var_prefix, suffix)).ok();

        let kind = match var("KIND") {
            Some(kind) => kind
                .parse()
                .map_err(|e: String| ConfigError::invalid(format!("{}_KIND", var_prefix), e))?,
            None => name
                .parse()
                .map_err(|_| ConfigError::missing(format!("{}_KIND", var_prefix)))?,
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            account_sid: var("ACCOUNT_SID").unwrap_or_default(),
            auth_token: var("AUTH_TOKEN").unwrap_or_default(),
            from_number: var("FROM_NUMBER").unwrap_or_default(),
            api_base: var("API_BASE"),
            request_timeout_secs: var("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_request_timeout),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where failed deliveries are persisted for redelivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Mysql,
    Memory,
}

impl std::str::FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(QueueBackend::Mysql),
            "memory" => Ok(QueueBackend::Memory),
            _ => Err(format!("Invalid retry queue backend: {}", s)),
        }
    }
}

/// Retry queue and worker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_queue_backend")]
    pub backend: QueueBackend,

    /// Delivery attempts (including the first redelivery) before a task is abandoned
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    /// Tasks fetched per worker pass
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Pause between worker passes in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            max_attempts: default_retry_max_attempts(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl RetryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Providers in selection order; the first available one is used
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// How long a failing provider stays banned, in seconds
    #[serde(default = "default_ban_duration")]
    pub ban_duration_seconds: u64,

    /// Key prefix of ban entries in the shared cache
    #[serde(default = "default_ban_key_prefix")]
    pub ban_key_prefix: String,

    /// Time one provider gets to accept a message, in milliseconds;
    /// a provider that exceeds it is banned like one that failed
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Message bodies for providers that render templates locally,
    /// keyed by template id; `{name}` placeholders are substituted
    #[serde(default = "default_templates")]
    pub templates: BTreeMap<String, String>,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig::log("log")],
            ban_duration_seconds: default_ban_duration(),
            ban_key_prefix: default_ban_key_prefix(),
            send_timeout_ms: default_send_timeout(),
            templates: default_templates(),
            retry: RetryConfig::default(),
        }
    }
}

impl NotificationConfig {
    /// Create from environment variables
    ///
    /// `SMS_PROVIDERS` holds the comma-separated provider names in
    /// selection order; each provider reads its own `SMS_<NAME>_*` values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(names) = std::env::var("SMS_PROVIDERS") {
            config.providers = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ProviderConfig::from_env)
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(seconds) = std::env::var("SMS_BAN_DURATION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.ban_duration_seconds = seconds;
        }
        if let Some(ms) = std::env::var("SMS_SEND_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.send_timeout_ms = ms;
        }
        if let Some(backend) = std::env::var("SMS_RETRY_BACKEND")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.retry.backend = backend;
        }
        if let Some(max) = std::env::var("SMS_RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.retry.max_attempts = max;
        }

        Ok(config)
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_seconds)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Check provider names are unique and non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::missing("notification.providers"));
        }
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.name.is_empty() {
                return Err(ConfigError::invalid("notification.providers", "empty provider name"));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::invalid(
                    "notification.providers",
                    format!("duplicate provider name '{}'", provider.name),
                ));
            }
        }
        if self.ban_duration_seconds == 0 {
            return Err(ConfigError::invalid("ban_duration_seconds", "must be positive"));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::invalid("send_timeout_ms", "must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_send_timeout() -> u64 {
    2000
}

fn default_queue_backend() -> QueueBackend {
    QueueBackend::Memory
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_batch_size() -> u32 {
    50
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_ban_duration() -> u64 {
    300
}

fn default_ban_key_prefix() -> String {
    "banned_sms".to_string()
}

fn default_templates() -> BTreeMap<String, String> {
    let mut templates = BTreeMap::new();
    templates.insert(
        "1".to_string(),
        "Your verification code is {code}. It expires in {expiry} minutes.".to_string(),
    );
    templates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_notification_config() {
        let config = NotificationConfig::default();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::Log);
        assert_eq!(config.ban_duration(), Duration::from_secs(300));
        assert_eq!(config.ban_key_prefix, "banned_sms");
        assert_eq!(config.send_timeout(), Duration::from_secs(2));
        assert!(config.templates.contains_key("1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_provider_names_rejected() {
        let config = NotificationConfig {
            providers: vec![ProviderConfig::log("a"), ProviderConfig::log("a")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_order_is_preserved_when_deserializing() {
        let json = r#"{
            "providers": [
                {"name": "primary", "kind": "twilio", "account_sid": "AC1"},
                {"name": "fallback", "kind": "log"}
            ]
        }"#;
        let config: NotificationConfig = serde_json::from_str(json).unwrap();
        let names: Vec<_> = config.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["primary", "fallback"]);
        assert_eq!(config.providers[0].request_timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("Twilio".parse::<ProviderKind>(), Ok(ProviderKind::Twilio));
        assert_eq!("mock".parse::<ProviderKind>(), Ok(ProviderKind::Log));
        assert!("carrier-pigeon".parse::<ProviderKind>().is_err());
    }
}
