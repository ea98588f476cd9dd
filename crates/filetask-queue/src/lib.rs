//! filetask Queue Library
//!
//! Publishes task descriptors to a single durable work queue. Delivery is
//! at-least-once: consumers must tolerate duplicates.

#[cfg(feature = "queue-amqp")]
pub mod amqp;
pub mod factory;
pub mod memory;
pub mod traits;

#[cfg(feature = "queue-amqp")]
pub use amqp::AmqpPublisher;
pub use factory::create_publisher;
pub use memory::MemoryPublisher;
pub use traits::{QueueError, QueueResult, TaskPublisher};
