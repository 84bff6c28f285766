//! In-process retry queue for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::domain::entities::notification::{NewRetryTask, RetryTask, RetryTaskStatus};
use crate::errors::NotifyError;

use super::RetryQueue;

/// Retry queue held in memory; contents are lost on restart
#[derive(Default)]
pub struct InMemoryRetryQueue {
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    tasks: BTreeMap<u64, RetryTask>,
}

impl InMemoryRetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every task in id order, including finished ones
    pub fn tasks(&self) -> Vec<RetryTask> {
        self.lock().tasks.values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<RetryTask> {
        self.lock().tasks.get(&id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<F>(&self, id: u64, apply: F) -> Result<(), NotifyError>
    where
        F: FnOnce(&mut RetryTask),
    {
        let mut state = self.lock();
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or_else(|| NotifyError::retry_queue(format!("Retry task {} not found", id)))?;
        apply(task);
        task.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RetryQueue for InMemoryRetryQueue {
    async fn enqueue(&self, task: NewRetryTask) -> Result<u64, NotifyError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state
            .tasks
            .insert(id, RetryTask::from_new(id, task, Utc::now()));
        Ok(id)
    }

    async fn fetch_due(&self, limit: usize) -> Result<Vec<RetryTask>, NotifyError> {
        let state = self.lock();
        Ok(state
            .tasks
            .values()
            .filter(|task| task.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_succeeded(&self, id: u64) -> Result<(), NotifyError> {
        self.update(id, |task| {
            task.status = RetryTaskStatus::Succeeded;
            task.last_error = None;
        })
    }

    async fn record_failure(
        &self,
        id: u64,
        error: &str,
        abandon: bool,
    ) -> Result<(), NotifyError> {
        self.update(id, |task| {
            task.attempt_count += 1;
            task.last_error = Some(error.to_string());
            if abandon {
                task.status = RetryTaskStatus::Abandoned;
            }
        })
    }
}
