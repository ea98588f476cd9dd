use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::id::TaskId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// A tracked unit of work for one uploaded file.
///
/// This is also the message body published to the work queue and the value
/// stored under `task:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Task {
    #[schema(value_type = String, example = "01J9Z3K8Q4W5X6Y7Z8A9B0C1D2")]
    pub id: TaskId,
    pub object_key: String,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// New task in `pending` state
    pub fn new(
        id: TaskId,
        object_key: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Task {
            id,
            object_key: object_key.into(),
            file_name: file_name.into(),
            file_size,
            content_type: content_type.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Overwrite the status and bump `updated_at`.
    ///
    /// `error` is only kept for `Failed`: a non-empty message replaces the
    /// previous one, an empty or absent one leaves it in place. Any other
    /// status clears it.
    pub fn set_status(&mut self, status: TaskStatus, error: Option<&str>) {
        self.status = status;
        self.updated_at = Utc::now();
        if status != TaskStatus::Failed {
            self.error = None;
        } else if let Some(msg) = error.filter(|m| !m.is_empty()) {
            self.error = Some(msg.to_string());
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(
            TaskId::from_parts(1_700_000_000_000, 1),
            "uploads/01.png",
            "a.png",
            10,
            "image/png",
        )
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = sample();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.error.is_none());
        assert!(!task.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("running".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let task = sample();
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], task.id.to_string());
        assert_eq!(value["object_key"], "uploads/01.png");
        assert_eq!(value["file_name"], "a.png");
        assert_eq!(value["file_size"], 10);
        assert_eq!(value["content_type"], "image/png");
        assert_eq!(value["status"], "pending");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_set_status_keeps_identity_fields() {
        let mut task = sample();
        let before = task.clone();
        task.set_status(TaskStatus::Failed, Some("decoder crashed"));

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("decoder crashed"));
        assert_eq!(task.id, before.id);
        assert_eq!(task.object_key, before.object_key);
        assert_eq!(task.created_at, before.created_at);
        assert!(task.updated_at >= before.updated_at);
        assert!(task.is_terminal());
    }

    #[test]
    fn test_set_status_ignores_empty_error() {
        let mut task = sample();
        task.set_status(TaskStatus::Failed, Some(""));
        assert!(task.error.is_none());

        task.set_status(TaskStatus::Failed, Some("decoder crashed"));
        task.set_status(TaskStatus::Failed, None);
        assert_eq!(task.error.as_deref(), Some("decoder crashed"));
    }

    #[test]
    fn test_error_only_kept_while_failed() {
        let mut task = sample();
        task.set_status(TaskStatus::Processing, Some("not a failure"));
        assert!(task.error.is_none());

        task.set_status(TaskStatus::Failed, Some("decoder crashed"));
        assert_eq!(task.error.as_deref(), Some("decoder crashed"));

        task.set_status(TaskStatus::Processing, None);
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.error.is_none());
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("error").is_none());
    }
}
