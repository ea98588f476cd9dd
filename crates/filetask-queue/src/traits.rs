use async_trait::async_trait;
use filetask_core::Task;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Task serialization failed: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    #[error("Broker rejected message: {0}")]
    PublishRejected(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// Work queue publisher
///
/// `publish` sends the JSON form of the task as one persistent message. It
/// does not retry; every error is terminal for that call.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    async fn publish(&self, task: &Task) -> QueueResult<()>;

    /// Release the channel and connection. Safe to call more than once.
    async fn close(&self) -> QueueResult<()>;

    fn queue_name(&self) -> &str;
}
