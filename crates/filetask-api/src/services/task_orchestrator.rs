//! Task orchestration: upload, record, enqueue.
//!
//! The write path runs in a fixed order (storage write, then task record,
//! then queue message). Failures before the storage write reject the request
//! outright; failures after it leave an object behind and are reported as
//! degraded outcomes carrying the task that was built.

use filetask_core::{IdGenerator, Task, TaskId, TaskStatus};
use filetask_queue::{QueueError, TaskPublisher};
use filetask_storage::{ObjectStoreGateway, StorageError, StoredObject};
use filetask_store::{StoreError, TaskStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Upload of task {task_id} failed: {source}")]
    UploadFailed {
        task_id: TaskId,
        #[source]
        source: StorageError,
    },

    #[error("Persisting task {} failed: {source}", .task.id)]
    PersistFailed {
        task: Box<Task>,
        object: StoredObject,
        #[source]
        source: StoreError,
    },

    #[error("Publishing task {} failed: {source}", .task.id)]
    PublishFailed {
        task: Box<Task>,
        object: StoredObject,
        #[source]
        source: QueueError,
    },

    #[error("task not found")]
    NotFound(String),

    #[error("Task store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl TaskError {
    /// True when the file was stored but a later stage failed
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            TaskError::PersistFailed { .. } | TaskError::PublishFailed { .. }
        )
    }

    /// Pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            TaskError::PayloadTooLarge { .. } => "validate",
            TaskError::UploadFailed { .. } => "upload",
            TaskError::PersistFailed { .. } => "persist",
            TaskError::PublishFailed { .. } => "publish",
            TaskError::NotFound(_) | TaskError::StoreUnavailable(_) => "status",
        }
    }

    fn from_store(id: &TaskId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => TaskError::NotFound(id.to_string()),
            other => TaskError::StoreUnavailable(other),
        }
    }
}

/// A fully successful submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub task: Task,
    pub object: StoredObject,
}

/// Coordinates the gateway, the task store and the publisher.
///
/// Components are built by the caller and handed in; the orchestrator holds
/// no global state of its own beyond the injected id generator.
#[derive(Clone)]
pub struct TaskOrchestrator {
    ids: Arc<IdGenerator>,
    gateway: ObjectStoreGateway,
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn TaskPublisher>,
}

impl TaskOrchestrator {
    pub fn new(
        ids: Arc<IdGenerator>,
        gateway: ObjectStoreGateway,
        store: Arc<dyn TaskStore>,
        publisher: Arc<dyn TaskPublisher>,
    ) -> Self {
        Self {
            ids,
            gateway,
            store,
            publisher,
        }
    }

    /// Store the file, record a pending task and enqueue it.
    ///
    /// `declared_size` is 0 when the client did not announce one.
    pub async fn submit(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        declared_size: u64,
        file_name: &str,
        content_type: &str,
    ) -> Result<Submission, TaskError> {
        let start = std::time::Instant::now();
        let id = self.ids.next();

        let object = self
            .gateway
            .upload(&id, reader, declared_size, file_name, content_type)
            .await
            .map_err(|err| match err {
                StorageError::PayloadTooLarge { size, limit } => {
                    TaskError::PayloadTooLarge { size, limit }
                }
                source => TaskError::UploadFailed { task_id: id, source },
            })?;

        let task = Task::new(
            id,
            object.key.clone(),
            file_name.to_string(),
            object.size,
            object.content_type.clone(),
        );

        if let Err(source) = self.store.create(&task).await {
            tracing::error!(
                task_id = %id,
                key = %object.key,
                error = %source,
                "Task record not persisted, object left in storage"
            );
            return Err(TaskError::PersistFailed {
                task: Box::new(task),
                object,
                source,
            });
        }

        if let Err(source) = self.publisher.publish(&task).await {
            tracing::error!(
                task_id = %id,
                key = %object.key,
                queue = %self.publisher.queue_name(),
                error = %source,
                "Task not enqueued, record stays pending"
            );
            return Err(TaskError::PublishFailed {
                task: Box::new(task),
                object,
                source,
            });
        }

        tracing::info!(
            task_id = %id,
            key = %object.key,
            size_bytes = object.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Task submitted"
        );

        Ok(Submission { task, object })
    }

    /// Look up a task by its textual id.
    ///
    /// Malformed ids cannot name a stored task and are reported as not found.
    pub async fn status(&self, id: &str) -> Result<Task, TaskError> {
        let id: TaskId = id
            .parse()
            .map_err(|_| TaskError::NotFound(id.to_string()))?;
        self.status_by_id(&id).await
    }

    pub async fn status_by_id(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.store
            .get(id)
            .await
            .map_err(|err| TaskError::from_store(id, err))
    }

    /// State transition used by downstream consumers.
    pub async fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        error: Option<&str>,
    ) -> Result<Task, TaskError> {
        self.store
            .update_status(id, status, error)
            .await
            .map_err(|err| TaskError::from_store(id, err))
    }
}
