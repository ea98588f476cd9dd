//! In-memory publisher that records messages instead of sending them.

use crate::traits::{QueueError, QueueResult, TaskPublisher};
use async_trait::async_trait;
use filetask_core::Task;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Default)]
pub struct MemoryPublisher {
    queue_name: String,
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
    reject: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            ..Self::default()
        }
    }

    /// Answer every publish with a broker-style nack
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Fail every publish with `ConnectionFailure`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Raw message bodies in publish order
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Message bodies decoded back into tasks
    pub fn messages(&self) -> Vec<Task> {
        self.bodies()
            .iter()
            .filter_map(|body| serde_json::from_slice(body).ok())
            .collect()
    }
}

#[async_trait]
impl TaskPublisher for MemoryPublisher {
    async fn publish(&self, task: &Task) -> QueueResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::ConnectionFailure(
                "memory queue unavailable".to_string(),
            ));
        }
        let body = serde_json::to_vec(task)?;
        if self.reject.load(Ordering::SeqCst) {
            return Err(QueueError::PublishRejected(format!(
                "task {} nacked by broker",
                task.id
            )));
        }

        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body);
        Ok(())
    }

    async fn close(&self) -> QueueResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.queue_name
    }
}
