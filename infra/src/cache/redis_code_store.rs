//! Distributed code store backed by Redis server-side scripts
//!
//! Each record is a hash `{code, attempts}` under
//! `{prefix}:{business}:{recipient}` with a millisecond expiry. Issue and
//! verify each run as one Lua script, so the read, the decision and the
//! write happen atomically on the server no matter how many processes share
//! the Redis instance.

use async_trait::async_trait;
use redis::Script;
use tracing::{debug, error, warn};

use otp_core::domain::entities::verification_code::{CodeKey, IssuePolicy};
use otp_core::errors::CodeError;
use otp_core::services::CodeStore;
use otp_shared::phone::mask_phone_number;

use super::RedisClient;

const SET_CODE_SCRIPT: &str = include_str!("lua/set_code.lua");
const VERIFY_CODE_SCRIPT: &str = include_str!("lua/verify_code.lua");

/// Code store for multi-instance deployments
pub struct RedisCodeStore {
    client: RedisClient,
    policy: IssuePolicy,
    prefix: String,
    set_script: Script,
    verify_script: Script,
}

impl RedisCodeStore {
    pub fn new(client: RedisClient, policy: IssuePolicy, prefix: impl Into<String>) -> Self {
        Self {
            client,
            policy,
            prefix: prefix.into(),
            set_script: Script::new(SET_CODE_SCRIPT),
            verify_script: Script::new(VERIFY_CODE_SCRIPT),
        }
    }

    pub fn policy(&self) -> &IssuePolicy {
        &self.policy
    }

    /// Full Redis key for a record, including any global cache prefix
    pub fn key(&self, business: &str, recipient: &str) -> String {
        self.client
            .make_key(&CodeKey::new(business, recipient).storage_key(&self.prefix))
    }
}

/// Map an issue script reply onto the error taxonomy
pub(crate) fn set_reply(reply: i64) -> Result<(), CodeError> {
    match reply {
        0 => Ok(()),
        -1 => Err(CodeError::SendTooMany),
        -2 => {
            error!(event = "code_key_without_expiry", "Verification key exists without expiry");
            Err(CodeError::Unknown)
        }
        other => {
            warn!(reply = other, "Unexpected reply from issue script");
            Err(CodeError::Unknown)
        }
    }
}

/// Map a verify script reply onto the error taxonomy
pub(crate) fn verify_reply(reply: i64) -> Result<(), CodeError> {
    match reply {
        0 => Ok(()),
        -1 => Err(CodeError::VerifyTooManyTimes),
        -2 => Err(CodeError::VerifyFailed),
        -3 => Err(CodeError::Unknown),
        other => {
            warn!(reply = other, "Unexpected reply from verify script");
            Err(CodeError::Unknown)
        }
    }
}

fn storage_error(e: redis::RedisError) -> CodeError {
    error!(error = %e, "Redis code store command failed");
    CodeError::storage(e.to_string())
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn set(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        let key = self.key(business, recipient);
        let mut conn = self.client.connection();

        let reply: i64 = self
            .set_script
            .key(&key)
            .arg(code)
            .arg(self.policy.ttl.as_millis() as u64)
            .arg(self.policy.cooldown.as_millis() as u64)
            .arg(self.policy.max_attempts)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error)?;

        debug!(
            business = business,
            recipient = %mask_phone_number(recipient),
            reply = reply,
            "Issue script finished"
        );
        set_reply(reply)
    }

    async fn verify(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        let key = self.key(business, recipient);
        let mut conn = self.client.connection();

        let reply: i64 = self
            .verify_script
            .key(&key)
            .arg(code)
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error)?;

        debug!(
            business = business,
            recipient = %mask_phone_number(recipient),
            reply = reply,
            "Verify script finished"
        );
        verify_reply(reply)
    }
}
