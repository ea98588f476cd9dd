//! filetask Core Library
//!
//! Domain model, identifier generation, error types and configuration shared by
//! every filetask component.

pub mod config;
pub mod error;
pub mod id;
pub mod models;

// Re-export commonly used types
pub use config::{
    Config, InstanceConfig, LogFormat, LogOutput, LoggingConfig, QueueBackend, QueueConfig,
    StorageBackend, StorageConfig, StoreBackend, StoreConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use id::{IdGenerator, TaskId, TaskIdParseError};
pub use models::{Task, TaskStatus};
