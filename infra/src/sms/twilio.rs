//! Twilio SMS Provider
//!
//! Sends messages through the Twilio REST API (`Messages.json`) with
//! reqwest. Twilio has no server-side templates, so bodies are rendered
//! locally from the configured templates.
//!
//! Every non-2xx answer and every transport error is a failure; the
//! provider never retries, leaving that to the failover pool and the retry
//! queue.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use otp_core::domain::entities::notification::NamedArg;
use otp_shared::phone::{is_valid_international_phone, mask_phone_number, normalize_phone_number};
use otp_shared::ProviderConfig;

use super::sms_service::SmsProvider;
use super::template::TemplateRegistry;
use crate::InfrastructureError;

/// Default Twilio API base URL
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio SMS provider configuration
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    /// Twilio Account SID
    pub account_sid: String,
    /// Twilio Auth Token
    pub auth_token: String,
    /// From phone number (must be a Twilio phone number)
    pub from_number: String,
    /// API base URL, overridable for tests and regional endpoints
    pub api_base: String,
    /// Timeout for API requests
    pub request_timeout: Duration,
}

impl TwilioConfig {
    /// Build from a provider entry, checking required credentials
    pub fn from_provider(config: &ProviderConfig) -> Result<Self, InfrastructureError> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(InfrastructureError::Config(format!(
                "Provider {} is missing Twilio credentials",
                config.name
            )));
        }
        let from_number = normalize_phone_number(&config.from_number);
        if !is_valid_international_phone(&from_number) {
            return Err(InfrastructureError::Config(format!(
                "Provider {} from_number must be in E.164 format (starting with '+')",
                config.name
            )));
        }

        Ok(Self {
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| TWILIO_API_BASE.to_string()),
            request_timeout: config.request_timeout(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: Option<i64>,
    message: Option<String>,
}

/// Interpret a Twilio `Messages.json` answer
///
/// Success yields the message SID; anything else becomes an
/// `InfrastructureError::Sms` carrying the status and Twilio's error code.
pub(crate) fn interpret_response(status: StatusCode, body: &str) -> Result<String, InfrastructureError> {
    if status.is_success() {
        return serde_json::from_str::<MessageResponse>(body)
            .map(|response| response.sid)
            .map_err(|e| InfrastructureError::Sms(format!("Malformed Twilio response: {}", e)));
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|err| match (err.code, err.message) {
            (Some(code), Some(message)) => format!("error {}: {}", code, message),
            (Some(code), None) => format!("error {}", code),
            (None, Some(message)) => message,
            (None, None) => String::from("no detail"),
        })
        .unwrap_or_else(|| String::from("no detail"));

    Err(InfrastructureError::Sms(format!(
        "Twilio returned status {}: {}",
        status.as_u16(),
        detail
    )))
}

/// Twilio SMS provider
pub struct TwilioSmsProvider {
    name: String,
    client: Client,
    config: TwilioConfig,
    templates: TemplateRegistry,
}

impl TwilioSmsProvider {
    pub fn new(
        name: impl Into<String>,
        config: TwilioConfig,
        templates: TemplateRegistry,
    ) -> Result<Self, InfrastructureError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let name = name.into();

        info!(
            provider = %name,
            "Twilio SMS provider initialized with from number: {}",
            mask_phone_number(&config.from_number)
        );

        Ok(Self {
            name,
            client,
            config,
            templates,
        })
    }

    /// Create from a provider entry in the notification configuration
    pub fn from_provider(
        config: &ProviderConfig,
        templates: TemplateRegistry,
    ) -> Result<Self, InfrastructureError> {
        Self::new(config.name.clone(), TwilioConfig::from_provider(config)?, templates)
    }

    async fn send_one(&self, recipient: &str, body: &str) -> Result<String, InfrastructureError> {
        let form = [
            ("To", recipient),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(
                    provider = %self.name,
                    recipient = %mask_phone_number(recipient),
                    error = %e,
                    "Twilio request failed"
                );
                InfrastructureError::Http(e)
            })?;

        let status = response.status();
        let text = response.text().await?;
        interpret_response(status, &text)
    }
}

#[async_trait]
impl SmsProvider for TwilioSmsProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    /// One request per recipient, stopping at the first failure
    ///
    /// Recipients before the failing one have already been sent to. The
    /// failover pool calls this with a single recipient so a failure never
    /// leaves a message half-delivered.
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<Vec<String>, InfrastructureError> {
        let body = self
            .templates
            .render(template_id, args)
            .map_err(|e| InfrastructureError::Sms(e.to_string()))?;

        let mut sids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let sid = self.send_one(recipient, &body).await?;
            debug!(
                provider = %self.name,
                recipient = %mask_phone_number(recipient),
                sid = %sid,
                "SMS accepted by Twilio"
            );
            sids.push(sid);
        }
        Ok(sids)
    }
}
