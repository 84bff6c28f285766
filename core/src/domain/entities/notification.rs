//! Notification message arguments and retry tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named template argument; order matters for positional templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: String,
}

impl NamedArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Argument values in order, for vendors that take positional template data
pub fn arg_values(args: &[NamedArg]) -> Vec<String> {
    args.iter().map(|arg| arg.value.clone()).collect()
}

/// A failed delivery to be handed to the retry queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRetryTask {
    pub template_id: String,
    pub args: Vec<NamedArg>,
    pub recipients: Vec<String>,
    /// Deliveries already attempted for this message
    pub attempt_count: u32,
}

impl NewRetryTask {
    pub fn new(template_id: &str, args: &[NamedArg], recipients: &[String]) -> Self {
        Self {
            template_id: template_id.to_string(),
            args: args.to_vec(),
            recipients: recipients.to_vec(),
            attempt_count: 1,
        }
    }
}

/// Lifecycle of a queued retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryTaskStatus {
    Pending,
    Succeeded,
    Abandoned,
}

impl RetryTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryTaskStatus::Pending => "pending",
            RetryTaskStatus::Succeeded => "succeeded",
            RetryTaskStatus::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for RetryTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RetryTaskStatus::Pending),
            "succeeded" => Ok(RetryTaskStatus::Succeeded),
            "abandoned" => Ok(RetryTaskStatus::Abandoned),
            _ => Err(format!("Invalid retry task status: {}", s)),
        }
    }
}

/// A persisted delivery awaiting redelivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryTask {
    pub id: u64,
    pub template_id: String,
    pub args: Vec<NamedArg>,
    pub recipients: Vec<String>,
    pub attempt_count: u32,
    pub status: RetryTaskStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetryTask {
    /// Materialize a queued task with its assigned id
    pub fn from_new(id: u64, task: NewRetryTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            template_id: task.template_id,
            args: task.args,
            recipients: task.recipients,
            attempt_count: task.attempt_count,
            status: RetryTaskStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RetryTaskStatus::Pending
    }
}
