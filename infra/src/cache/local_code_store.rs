//! In-process code store guarded by striped mutexes
//!
//! Records live in `shards` hash maps, each behind its own
//! `std::sync::Mutex`; a key always maps to the same shard. Every operation
//! takes exactly one shard lock and never awaits while holding it, so a
//! cancelled caller cannot leave a record half-updated and unrelated keys
//! rarely contend.
//!
//! Expired records are dropped from a shard whenever a code is issued into
//! it, so memory stays proportional to the live records plus whatever
//! expired since the shard was last written.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use otp_core::domain::entities::verification_code::{
    CodeKey, IssuePolicy, VerificationRecord, VerifyOutcome,
};
use otp_core::errors::CodeError;
use otp_core::services::CodeStore;

type Shard = HashMap<String, VerificationRecord>;

/// Code store held in process memory
///
/// **Single process only.** Two instances each holding their own store
/// would each grant a cooldown window and an attempt budget, so a
/// multi-instance deployment must use [`super::RedisCodeStore`].
pub struct LocalCodeStore {
    shards: Vec<Mutex<Shard>>,
    policy: IssuePolicy,
    prefix: String,
}

impl LocalCodeStore {
    pub fn new(policy: IssuePolicy, prefix: impl Into<String>, shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards,
            policy,
            prefix: prefix.into(),
        }
    }

    pub fn policy(&self) -> &IssuePolicy {
        &self.policy
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn key(&self, business: &str, recipient: &str) -> String {
        CodeKey::new(business, recipient).storage_key(&self.prefix)
    }

    fn shard(&self, key: &str) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        self.shards[index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remaining attempts for a live record
    pub fn remaining_attempts(&self, business: &str, recipient: &str) -> Option<u32> {
        let key = self.key(business, recipient);
        let now = Instant::now();
        self.shard(&key)
            .get(&key)
            .filter(|record| !record.is_expired(now))
            .map(VerificationRecord::remaining_attempts)
    }

    /// Drop expired records; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut records = shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = records.len();
            records.retain(|_, record| !record.is_expired(now));
            removed += before - records.len();
        }
        if removed > 0 {
            debug!(removed = removed, "Purged expired verification records");
        }
        removed
    }

    /// Number of records currently held, expired ones included
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CodeStore for LocalCodeStore {
    async fn set(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        let key = self.key(business, recipient);
        let now = Instant::now();
        let mut records = self.shard(&key);

        let remaining = records.get(&key).and_then(|record| record.remaining_ttl(now));
        if !self.policy.admits(remaining) {
            return Err(CodeError::SendTooMany);
        }

        // Sweep the locked shard so unverified records cannot accumulate
        records.retain(|_, record| !record.is_expired(now));
        records.insert(key, VerificationRecord::issue(code, &self.policy, now));
        Ok(())
    }

    async fn verify(&self, business: &str, recipient: &str, code: &str) -> Result<(), CodeError> {
        let key = self.key(business, recipient);
        let now = Instant::now();
        let mut records = self.shard(&key);

        let expired = match records.get(&key) {
            Some(record) => record.is_expired(now),
            None => return Err(CodeError::Unknown),
        };
        if expired {
            records.remove(&key);
            return Err(CodeError::Unknown);
        }

        let outcome = match records.get_mut(&key) {
            Some(record) => record.check(code),
            None => return Err(CodeError::Unknown),
        };

        match outcome {
            VerifyOutcome::Matched => {
                records.remove(&key);
                Ok(())
            }
            VerifyOutcome::Mismatched { .. } => Err(CodeError::VerifyFailed),
            VerifyOutcome::Exhausted => Err(CodeError::VerifyTooManyTimes),
        }
    }
}
