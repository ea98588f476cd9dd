//! In-memory object storage for tests and infrastructure-free local runs.

use crate::chunk::{read_chunk, UploadDeadline};
use crate::keys::validate_key;
use crate::traits::{ObjectStorage, StorageError, StorageResult, UploadLimits};
use crate::StorageBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncRead;

const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, StoredBlob>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail with `ConnectionFailure`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn object(&self, key: &str) -> Option<StoredBlob> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredBlob>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn ensure_bucket(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        limits: UploadLimits,
    ) -> StorageResult<u64> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::ConnectionFailure(
                "memory storage marked unavailable".to_string(),
            ));
        }
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let data = UploadDeadline::start(limits)
            .run(key, async {
                let mut data = Vec::new();
                let mut total = 0u64;
                loop {
                    let chunk =
                        read_chunk(&mut *reader, READ_CHUNK_SIZE, &mut total, limits.max_size)
                            .await?;
                    if chunk.is_empty() {
                        break;
                    }
                    data.extend_from_slice(&chunk);
                }
                Ok::<_, StorageError>(data)
            })
            .await?;
        let total = data.len() as u64;

        self.lock().insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );

        tracing::debug!(key = %key, size_bytes = total, "Memory storage upload successful");
        Ok(total)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.lock().contains_key(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://objects/{}", key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
