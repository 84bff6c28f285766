//! Verification record entity and the issue/verify state machine.
//!
//! Both code store backends follow the rules encoded here: the in-memory
//! backend calls these methods directly, the Redis backend mirrors them in
//! its server-side scripts.

use constant_time_eq::constant_time_eq;
use std::time::Duration;
use tokio::time::Instant;

use otp_shared::VerificationConfig;

/// Identifies one pending code: the business flow plus the recipient
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeKey {
    /// Business flow the code gates, e.g. `login` or `signup`
    pub business: String,
    /// Phone number (or other address) the code was sent to
    pub recipient: String,
}

impl CodeKey {
    pub fn new(business: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            business: business.into(),
            recipient: recipient.into(),
        }
    }

    /// Storage key, e.g. `phone_code:login:13800000000`
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}:{}:{}", prefix, self.business, self.recipient)
    }
}

/// Lifetime, cooldown and attempt budget applied when issuing codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuePolicy {
    /// Total lifetime `T` of a record
    pub ttl: Duration,
    /// Cooldown window `C`
    pub cooldown: Duration,
    /// Attempts granted to a fresh record
    pub max_attempts: u32,
}

impl IssuePolicy {
    pub fn new(ttl: Duration, cooldown: Duration, max_attempts: u32) -> Self {
        Self {
            ttl,
            cooldown,
            max_attempts,
        }
    }

    pub fn from_config(config: &VerificationConfig) -> Self {
        Self::new(config.code_ttl(), config.resend_cooldown(), config.max_attempts)
    }

    /// Remaining lifetime above which a record is still inside its cooldown
    pub fn reissue_threshold(&self) -> Duration {
        self.ttl.saturating_sub(self.cooldown)
    }

    /// Whether a new code may replace a record with `remaining_ttl` left
    ///
    /// `None` means no live record exists.
    pub fn admits(&self, remaining_ttl: Option<Duration>) -> bool {
        match remaining_ttl {
            None => true,
            Some(remaining) => remaining <= self.reissue_threshold(),
        }
    }
}

impl Default for IssuePolicy {
    fn default() -> Self {
        Self::from_config(&VerificationConfig::default())
    }
}

/// Result of checking a supplied code against a live record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Matched,
    Mismatched { remaining_attempts: u32 },
    Exhausted,
}

/// A pending code with its remaining attempt budget
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    code: String,
    remaining_attempts: u32,
    expires_at: Instant,
}

impl VerificationRecord {
    /// Create a fresh record with a full attempt budget and lifetime
    pub fn issue(code: impl Into<String>, policy: &IssuePolicy, now: Instant) -> Self {
        Self {
            code: code.into(),
            remaining_attempts: policy.max_attempts,
            expires_at: now + policy.ttl,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.remaining_attempts
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Lifetime left at `now`, or `None` once expired
    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .checked_duration_since(now)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Check `supplied` against the stored code
    ///
    /// An exhausted record is left untouched; a mismatch consumes one attempt.
    pub fn check(&mut self, supplied: &str) -> VerifyOutcome {
        if self.remaining_attempts == 0 {
            return VerifyOutcome::Exhausted;
        }
        if codes_match(&self.code, supplied) {
            VerifyOutcome::Matched
        } else {
            self.remaining_attempts -= 1;
            VerifyOutcome::Mismatched {
                remaining_attempts: self.remaining_attempts,
            }
        }
    }
}

/// Constant-time comparison of a stored and a supplied code
pub fn codes_match(stored: &str, supplied: &str) -> bool {
    stored.len() == supplied.len() && constant_time_eq(stored.as_bytes(), supplied.as_bytes())
}
