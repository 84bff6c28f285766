//! MySQL implementation of the RetryQueue trait.
//!
//! Tasks live in the `sms_retry_tasks` table. Arguments and recipients are
//! stored as JSON text so the template order survives the round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

use otp_core::domain::entities::notification::{NamedArg, NewRetryTask, RetryTask, RetryTaskStatus};
use otp_core::errors::NotifyError;
use otp_core::repositories::RetryQueue;

/// MySQL implementation of RetryQueue
///
/// `fetch_due` does not claim rows, so run one retry worker per database.
pub struct MySqlRetryQueue {
    pool: MySqlPool,
}

impl MySqlRetryQueue {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::mysql::MySqlRow) -> Result<RetryTask, NotifyError> {
        let args: String = row.try_get("args").map_err(column_error("args"))?;
        let recipients: String = row.try_get("recipients").map_err(column_error("recipients"))?;
        let status: String = row.try_get("status").map_err(column_error("status"))?;

        Ok(RetryTask {
            id: row.try_get("id").map_err(column_error("id"))?,
            template_id: row.try_get("template_id").map_err(column_error("template_id"))?,
            args: serde_json::from_str::<Vec<NamedArg>>(&args)
                .map_err(|e| NotifyError::retry_queue(format!("Invalid args JSON: {}", e)))?,
            recipients: serde_json::from_str::<Vec<String>>(&recipients)
                .map_err(|e| NotifyError::retry_queue(format!("Invalid recipients JSON: {}", e)))?,
            attempt_count: row
                .try_get("attempt_count")
                .map_err(column_error("attempt_count"))?,
            status: status.parse::<RetryTaskStatus>().map_err(NotifyError::retry_queue)?,
            last_error: row.try_get("last_error").map_err(column_error("last_error"))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(column_error("created_at"))?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(column_error("updated_at"))?,
        })
    }

    fn expect_updated(id: u64, rows: u64) -> Result<(), NotifyError> {
        if rows == 0 {
            return Err(NotifyError::retry_queue(format!("Retry task {} not found", id)));
        }
        Ok(())
    }
}

fn column_error(column: &'static str) -> impl Fn(sqlx::Error) -> NotifyError {
    move |e| NotifyError::retry_queue(format!("Failed to get {}: {}", column, e))
}

fn query_error(action: &'static str) -> impl Fn(sqlx::Error) -> NotifyError {
    move |e| {
        tracing::error!(error = %e, "Retry queue query failed: {}", action);
        NotifyError::retry_queue(format!("Failed to {}: {}", action, e))
    }
}

#[async_trait]
impl RetryQueue for MySqlRetryQueue {
    async fn enqueue(&self, task: NewRetryTask) -> Result<u64, NotifyError> {
        let args = serde_json::to_string(&task.args)
            .map_err(|e| NotifyError::retry_queue(format!("Failed to encode args: {}", e)))?;
        let recipients = serde_json::to_string(&task.recipients)
            .map_err(|e| NotifyError::retry_queue(format!("Failed to encode recipients: {}", e)))?;
        let now = Utc::now();

        let query = r#"
            INSERT INTO sms_retry_tasks (
                template_id, args, recipients, attempt_count, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;

        let result = sqlx::query(query)
            .bind(&task.template_id)
            .bind(args)
            .bind(recipients)
            .bind(task.attempt_count)
            .bind(RetryTaskStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(query_error("enqueue retry task"))?;

        Ok(result.last_insert_id())
    }

    async fn fetch_due(&self, limit: usize) -> Result<Vec<RetryTask>, NotifyError> {
        let query = r#"
            SELECT id, template_id, args, recipients, attempt_count, status,
                   last_error, created_at, updated_at
            FROM sms_retry_tasks
            WHERE status = ?
            ORDER BY id ASC
            LIMIT ?
        "#;

        let rows = sqlx::query(query)
            .bind(RetryTaskStatus::Pending.as_str())
            .bind(limit as u64)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("fetch retry tasks"))?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn mark_succeeded(&self, id: u64) -> Result<(), NotifyError> {
        let query = r#"
            UPDATE sms_retry_tasks
            SET status = ?, last_error = NULL, updated_at = ?
            WHERE id = ?
        "#;

        let result = sqlx::query(query)
            .bind(RetryTaskStatus::Succeeded.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error("mark retry task succeeded"))?;

        Self::expect_updated(id, result.rows_affected())
    }

    async fn record_failure(
        &self,
        id: u64,
        error: &str,
        abandon: bool,
    ) -> Result<(), NotifyError> {
        let status = if abandon {
            RetryTaskStatus::Abandoned
        } else {
            RetryTaskStatus::Pending
        };
        let query = r#"
            UPDATE sms_retry_tasks
            SET attempt_count = attempt_count + 1, last_error = ?, status = ?, updated_at = ?
            WHERE id = ?
        "#;

        let result = sqlx::query(query)
            .bind(error)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_error("record retry failure"))?;

        Self::expect_updated(id, result.rows_affected())
    }
}
