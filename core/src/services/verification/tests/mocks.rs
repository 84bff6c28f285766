//! Mock implementations for testing the code service

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::entities::notification::NamedArg;
use crate::domain::entities::verification_code::{
    CodeKey, IssuePolicy, VerificationRecord, VerifyOutcome,
};
use crate::errors::{CodeError, NotifyError};
use crate::services::verification::traits::{CodeStore, NotificationGateway};

// Mock code store following the record state machine
pub struct MockCodeStore {
    pub records: Arc<Mutex<HashMap<CodeKey, VerificationRecord>>>,
    pub policy: IssuePolicy,
    pub fail_with: Option<CodeError>,
    pub delay: Option<Duration>,
}

impl MockCodeStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            policy: IssuePolicy::default(),
            fail_with: None,
            delay: None,
        }
    }

    pub fn failing(error: CodeError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn stored_code(&self, business: &str, recipient: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&CodeKey::new(business, recipient))
            .map(|record| record.code().to_string())
    }

    async fn before_call(&self) -> Result<(), CodeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CodeStore for MockCodeStore {
    async fn set(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        self.before_call().await?;
        let now = Instant::now();
        let key = CodeKey::new(business, recipient);
        let mut records = self.records.lock().unwrap();

        let remaining = records.get(&key).and_then(|r| r.remaining_ttl(now));
        if !self.policy.admits(remaining) {
            return Err(CodeError::SendTooMany);
        }
        records.insert(key, VerificationRecord::issue(code, &self.policy, now));
        Ok(())
    }

    async fn verify(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        self.before_call().await?;
        let now = Instant::now();
        let key = CodeKey::new(business, recipient);
        let mut records = self.records.lock().unwrap();

        let record = match records.get_mut(&key) {
            Some(record) if !record.is_expired(now) => record,
            _ => return Err(CodeError::Unknown),
        };
        match record.check(code) {
            VerifyOutcome::Matched => {
                records.remove(&key);
                Ok(())
            }
            VerifyOutcome::Mismatched { .. } => Err(CodeError::VerifyFailed),
            VerifyOutcome::Exhausted => Err(CodeError::VerifyTooManyTimes),
        }
    }
}

// A message captured by the mock gateway
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub template_id: String,
    pub args: Vec<NamedArg>,
    pub recipients: Vec<String>,
}

// Mock gateway recording every message
pub struct MockGateway {
    pub sent: Arc<Mutex<Vec<SentMessage>>>,
    pub should_fail: bool,
}

impl MockGateway {
    pub fn new(should_fail: bool) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            should_fail,
        }
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for MockGateway {
    async fn send(
        &self,
        template_id: &str,
        args: &[NamedArg],
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        if self.should_fail {
            return Err(NotifyError::send_failed("mock", "gateway down"));
        }
        self.sent.lock().unwrap().push(SentMessage {
            template_id: template_id.to_string(),
            args: args.to_vec(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}
