//! Storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Storage connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Failed to read upload stream: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Bucket {0} is already taken by another account")]
    BucketConflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    /// True for errors raised before any byte reached the backend
    pub fn is_rejection(&self) -> bool {
        matches!(self, StorageError::PayloadTooLarge { .. })
    }

    pub(crate) fn timed_out(key: &str, timeout: Duration) -> Self {
        StorageError::ConnectionFailure(format!(
            "upload of {} timed out after {}ms",
            key,
            timeout.as_millis()
        ))
    }
}

/// Bounds a backend applies to a single upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    /// Largest number of bytes accepted from the reader
    pub max_size: u64,
    /// Deadline for moving the bytes; cleanup of a failed upload runs after it
    pub timeout: Duration,
}

impl UploadLimits {
    pub fn new(max_size: u64, timeout: Duration) -> Self {
        Self { max_size, timeout }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Backends receive a fully formed key and a reader of unknown length. They
/// must read in bounded chunks and stop with `PayloadTooLarge` as soon as more
/// than `limits.max_size` bytes have been read. Backends enforce
/// `limits.timeout` themselves so a timed out upload still releases whatever
/// it left behind (temporary files, open multipart uploads).
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create the bucket (or equivalent) if it does not exist yet.
    ///
    /// Must be idempotent: a bucket already owned by this account is success.
    async fn ensure_bucket(&self) -> StorageResult<()>;

    /// Stream `reader` to `key` until EOF and return the number of bytes stored.
    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        limits: UploadLimits,
    ) -> StorageResult<u64>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Publicly reachable URL for a stored key
    fn public_url(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
