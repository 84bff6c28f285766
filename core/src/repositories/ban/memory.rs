//! In-process ban-list.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::NotifyError;

use super::ProviderBanList;

/// Ban-list held in process memory
///
/// Only suitable when a single instance sends notifications; use the
/// Redis ban-list to share bans between instances.
#[derive(Default)]
pub struct LocalBanList {
    bans: Mutex<HashMap<String, Instant>>,
}

impl LocalBanList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.bans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProviderBanList for LocalBanList {
    async fn banned_among(&self, providers: &[String]) -> Result<HashSet<String>, NotifyError> {
        let now = Instant::now();
        let mut bans = self.lock();
        bans.retain(|_, until| *until > now);

        Ok(providers
            .iter()
            .filter(|name| bans.contains_key(name.as_str()))
            .cloned()
            .collect())
    }

    async fn ban(&self, provider: &str, duration: Duration) -> Result<bool, NotifyError> {
        let now = Instant::now();
        let mut bans = self.lock();

        match bans.get(provider) {
            Some(until) if *until > now => Ok(false),
            _ => {
                bans.insert(provider.to_string(), now + duration);
                Ok(true)
            }
        }
    }
}
