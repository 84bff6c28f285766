//! Retry queue trait defining the interface for failed-delivery persistence.

use async_trait::async_trait;

use crate::domain::entities::notification::{NewRetryTask, RetryTask};
use crate::errors::NotifyError;

/// Durable queue of deliveries that failed on every attempt so far
///
/// Implementations persist tasks until they are marked succeeded or
/// abandoned. Failures surface as `NotifyError::RetryQueue`.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Queue a failed delivery and return its id
    async fn enqueue(&self, task: NewRetryTask) -> Result<u64, NotifyError>;

    /// Pending tasks, oldest first, at most `limit`
    async fn fetch_due(&self, limit: usize) -> Result<Vec<RetryTask>, NotifyError>;

    /// Mark a task as delivered
    async fn mark_succeeded(&self, id: u64) -> Result<(), NotifyError>;

    /// Count one more failed attempt for a task
    ///
    /// # Arguments
    /// * `id` - Task to update
    /// * `error` - Failure reason kept as `last_error`
    /// * `abandon` - Stop retrying this task
    async fn record_failure(&self, id: u64, error: &str, abandon: bool)
        -> Result<(), NotifyError>;
}
