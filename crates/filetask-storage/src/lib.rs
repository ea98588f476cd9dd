//! filetask Storage Library
//!
//! Object storage abstraction and backends for uploaded files. The
//! [`ObjectStoreGateway`] sits in front of a backend and owns the upload
//! policy. Backends move the bytes and enforce the [`UploadLimits`] the gateway
//! hands them, cleaning up after themselves when a limit is hit.
//!
//! # Object key format
//!
//! Every backend stores uploads under `uploads/{task_id}{extension}`, where the
//! extension is taken from the client-supplied file name. Key generation lives in
//! the `keys` module so all backends stay consistent.

mod chunk;
pub mod factory;
pub mod gateway;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filetask_core::StorageBackend;
pub use gateway::{ObjectStoreGateway, StoredObject};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectStorage, StorageError, StorageResult, UploadLimits};
