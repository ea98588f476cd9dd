//! Upload policy in front of a storage backend.

use crate::keys::object_key;
use crate::traits::{ObjectStorage, StorageError, StorageResult, UploadLimits};
use filetask_core::{StorageConfig, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Where an upload landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Public URL of the object
    pub location: String,
    /// Bytes actually stored
    pub size: u64,
    pub content_type: String,
}

/// Object Store Gateway
///
/// Enforces the declared size ceiling, derives the object key from the task
/// id and hands the backend the limits it enforces while streaming (actual
/// size and timeout). Errors are terminal; nothing is retried here.
#[derive(Clone)]
pub struct ObjectStoreGateway {
    storage: Arc<dyn ObjectStorage>,
    max_upload_size: u64,
    upload_timeout: Duration,
}

impl ObjectStoreGateway {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_upload_size: u64, upload_timeout: Duration) -> Self {
        Self {
            storage,
            max_upload_size,
            upload_timeout,
        }
    }

    pub fn from_config(storage: Arc<dyn ObjectStorage>, config: &StorageConfig) -> Self {
        Self::new(storage, config.max_upload_size, config.upload_timeout)
    }

    /// Idempotent bucket provisioning, run once before serving traffic.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        self.storage.ensure_bucket().await
    }

    /// Stream an upload into storage under `uploads/{id}{ext}`.
    ///
    /// `declared_size` is the client's claim (0 when unknown). It is checked
    /// before any storage call; the bytes actually read are checked again while
    /// streaming.
    pub async fn upload(
        &self,
        id: &TaskId,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        declared_size: u64,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        if declared_size > self.max_upload_size {
            return Err(StorageError::PayloadTooLarge {
                size: declared_size,
                limit: self.max_upload_size,
            });
        }

        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        let key = object_key(id, file_name);

        let limits = UploadLimits::new(self.max_upload_size, self.upload_timeout);
        let size = self
            .storage
            .put_stream(&key, content_type, reader, limits)
            .await?;

        Ok(StoredObject {
            location: self.storage.public_url(&key),
            key,
            size,
            content_type: content_type.to_string(),
        })
    }
}
