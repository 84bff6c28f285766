//! Background redelivery of queued SMS messages
//!
//! The worker drains the retry queue in batches through the failover
//! pool. Each pass is one call to [`RetryWorker::run_once`]; `spawn` runs
//! passes on an interval until told to stop and hands back the totals.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use otp_core::errors::NotifyError;
use otp_core::repositories::RetryQueue;
use otp_shared::RetryConfig;

use super::failover_sms::FailoverSmsGateway;

/// Outcome counts for one or more passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Tasks delivered and marked succeeded
    pub succeeded: usize,
    /// Tasks that failed again and stay queued
    pub rescheduled: usize,
    /// Tasks that used their last attempt
    pub abandoned: usize,
    /// Passes that could not read or update the queue
    pub failed_passes: usize,
}

impl RetryReport {
    pub fn merge(&mut self, other: RetryReport) {
        self.succeeded += other.succeeded;
        self.rescheduled += other.rescheduled;
        self.abandoned += other.abandoned;
        self.failed_passes += other.failed_passes;
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.rescheduled + self.abandoned
    }
}

/// Drains the retry queue through the failover pool
pub struct RetryWorker {
    queue: Arc<dyn RetryQueue>,
    gateway: Arc<FailoverSmsGateway>,
    config: RetryConfig,
}

impl RetryWorker {
    pub fn new(
        queue: Arc<dyn RetryQueue>,
        gateway: Arc<FailoverSmsGateway>,
        config: RetryConfig,
    ) -> Self {
        Self {
            queue,
            gateway,
            config,
        }
    }

    /// Redeliver one batch of pending tasks
    ///
    /// Only a provider failure counts against a task's attempts. When every
    /// provider is banned the pass stops early; when the ban-list itself
    /// fails the pass returns that error. Either way the remaining tasks
    /// keep their attempt count and are picked up by a later pass.
    pub async fn run_once(&self) -> Result<RetryReport, NotifyError> {
        let tasks = self.queue.fetch_due(self.config.batch_size as usize).await?;
        let mut report = RetryReport::default();

        if tasks.is_empty() {
            return Ok(report);
        }
        debug!(tasks = tasks.len(), "Redelivering queued SMS messages");

        for task in tasks {
            match self
                .gateway
                .deliver(&task.template_id, &task.args, &task.recipients)
                .await
            {
                Ok(()) => {
                    self.queue.mark_succeeded(task.id).await?;
                    report.succeeded += 1;
                    info!(task_id = task.id, event = "sms_retry_succeeded", "Queued SMS delivered");
                }
                Err(NotifyError::NoAvailableProvider) => {
                    warn!(task_id = task.id, "No SMS provider available, deferring retries");
                    break;
                }
                Err(e @ NotifyError::SendFailed { .. }) => {
                    let abandon = task.attempt_count + 1 >= self.config.max_attempts;
                    self.queue
                        .record_failure(task.id, &e.to_string(), abandon)
                        .await?;
                    if abandon {
                        report.abandoned += 1;
                        error!(
                            task_id = task.id,
                            attempts = task.attempt_count + 1,
                            error = %e,
                            event = "sms_retry_abandoned",
                            "Giving up on queued SMS"
                        );
                    } else {
                        report.rescheduled += 1;
                        warn!(
                            task_id = task.id,
                            attempts = task.attempt_count + 1,
                            error = %e,
                            event = "sms_retry_failed",
                            "Queued SMS failed again"
                        );
                    }
                }
                // Not the message's fault; leave the batch for a later pass
                Err(e) => {
                    error!(
                        task_id = task.id,
                        error = %e,
                        event = "sms_retry_pass_failed",
                        "Provider selection failed, deferring retries"
                    );
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Run passes every `poll_interval` until `shutdown` turns true or its
    /// sender is dropped
    ///
    /// The handle resolves to the accumulated report. Queue errors are
    /// logged, counted in `failed_passes` and do not stop the loop.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<RetryReport> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut total = RetryReport::default();

            info!(
                poll_interval_ms = self.config.poll_interval_ms,
                batch_size = self.config.batch_size,
                "SMS retry worker started"
            );

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(report) => total.merge(report),
                            Err(e) => {
                                total.failed_passes += 1;
                                error!(error = %e, event = "sms_retry_pass_failed", "SMS retry pass failed");
                            }
                        }
                    }
                }
            }

            info!(
                succeeded = total.succeeded,
                rescheduled = total.rescheduled,
                abandoned = total.abandoned,
                "SMS retry worker stopped"
            );
            total
        })
    }
}
