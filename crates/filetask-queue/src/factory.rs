#[cfg(feature = "queue-amqp")]
use crate::AmqpPublisher;
#[cfg(not(feature = "queue-amqp"))]
use crate::QueueError;
use crate::{MemoryPublisher, QueueResult, TaskPublisher};
use filetask_core::{QueueBackend, QueueConfig};
use std::sync::Arc;

/// Create a task publisher based on configuration
pub async fn create_publisher(config: &QueueConfig) -> QueueResult<Arc<dyn TaskPublisher>> {
    match config.backend {
        #[cfg(feature = "queue-amqp")]
        QueueBackend::Amqp => {
            let publisher = AmqpPublisher::connect(config).await?;
            Ok(Arc::new(publisher))
        }

        #[cfg(not(feature = "queue-amqp"))]
        QueueBackend::Amqp => Err(QueueError::ConnectionFailure(
            "AMQP publisher not available (queue-amqp feature not enabled)".to_string(),
        )),

        QueueBackend::Memory => Ok(Arc::new(MemoryPublisher::new(config.queue_name.clone()))),
    }
}
