//! RabbitMQ publisher on top of `lapin`.
//!
//! One connection, one channel. The channel runs in publisher-confirm mode so
//! a broker nack surfaces as `PublishRejected` instead of being lost.

use crate::traits::{QueueError, QueueResult, TaskPublisher};
use async_trait::async_trait;
use filetask_core::{QueueConfig, Task};
use lapin::options::{BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::time::Duration;

const PERSISTENT_DELIVERY_MODE: u8 = 2;
const CONTENT_TYPE_JSON: &str = "application/json";
const REPLY_SUCCESS: u16 = 200;

fn connection_error(err: lapin::Error) -> QueueError {
    QueueError::ConnectionFailure(err.to_string())
}

pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    queue_name: String,
    publish_timeout: Duration,
}

impl AmqpPublisher {
    /// Connect, set the prefetch hint, declare the durable queue and enable confirms.
    pub async fn connect(config: &QueueConfig) -> QueueResult<Self> {
        let connection = tokio::time::timeout(
            config.publish_timeout,
            Connection::connect(&config.url, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| {
            QueueError::ConnectionFailure(format!(
                "connecting to broker timed out after {:?}",
                config.publish_timeout
            ))
        })?
        .map_err(connection_error)?;

        let channel = connection.create_channel().await.map_err(connection_error)?;

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(connection_error)?;

        let queue = channel
            .queue_declare(
                &config.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(connection_error)?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(connection_error)?;

        tracing::info!(
            queue = %config.queue_name,
            messages = queue.message_count(),
            consumers = queue.consumer_count(),
            prefetch = config.prefetch,
            "Connected to RabbitMQ"
        );

        Ok(AmqpPublisher {
            connection,
            channel,
            queue_name: config.queue_name.clone(),
            publish_timeout: config.publish_timeout,
        })
    }

    fn properties() -> BasicProperties {
        BasicProperties::default()
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_content_type(CONTENT_TYPE_JSON.into())
    }
}

#[async_trait]
impl TaskPublisher for AmqpPublisher {
    async fn publish(&self, task: &Task) -> QueueResult<()> {
        let body = serde_json::to_vec(task)?;
        let start = std::time::Instant::now();

        let confirmation = tokio::time::timeout(self.publish_timeout, async {
            self.channel
                .basic_publish(
                    "",
                    &self.queue_name,
                    BasicPublishOptions::default(),
                    &body,
                    Self::properties(),
                )
                .await?
                .await
        })
        .await
        .map_err(|_| {
            QueueError::ConnectionFailure(format!(
                "publish timed out after {:?}",
                self.publish_timeout
            ))
        })?
        .map_err(connection_error)?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(QueueError::PublishRejected(format!(
                "task {} nacked by broker",
                task.id
            )));
        }

        tracing::info!(
            task_id = %task.id,
            queue = %self.queue_name,
            size_bytes = body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Task published"
        );
        Ok(())
    }

    async fn close(&self) -> QueueResult<()> {
        let mut errors = Vec::new();

        if self.channel.status().connected() {
            if let Err(e) = self.channel.close(REPLY_SUCCESS, "closing").await {
                errors.push(format!("failed to close channel: {}", e));
            }
        }
        if self.connection.status().connected() {
            if let Err(e) = self.connection.close(REPLY_SUCCESS, "closing").await {
                errors.push(format!("failed to close connection: {}", e));
            }
        }

        if errors.is_empty() {
            tracing::info!(queue = %self.queue_name, "RabbitMQ connection closed");
            Ok(())
        } else {
            Err(QueueError::ConnectionFailure(errors.join("; ")))
        }
    }

    fn queue_name(&self) -> &str {
        &self.queue_name
    }
}
