//! Task store abstraction trait

use async_trait::async_trait;
use filetask_core::{Task, TaskId, TaskStatus};
use thiserror::Error;

/// Task store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("Task store connection failure: {0}")]
    Connection(String),

    #[error("Task serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for task store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Task state store
///
/// Records expire a fixed time after their last write. There is no locking:
/// concurrent status updates of the same id are last-write-wins.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a task, silently replacing any record with the same id.
    async fn create(&self, task: &Task) -> StoreResult<()>;

    /// Fetch a task; `NotFound` when absent or expired.
    async fn get(&self, id: &TaskId) -> StoreResult<Task>;

    /// Overwrite status and `updated_at` (and `error` when given), then
    /// re-persist with a fresh expiry.
    async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        error: Option<&str>,
    ) -> StoreResult<Task> {
        let mut task = self.get(id).await?;
        task.set_status(status, error);
        self.create(&task).await?;

        tracing::info!(
            task_id = %id,
            status = %status,
            "Task status updated"
        );
        Ok(task)
    }

    /// Release connections. Further calls fail with `Connection`.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
