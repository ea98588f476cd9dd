use crate::chunk::{read_chunk, UploadDeadline};
use crate::keys::validate_key;
use crate::traits::{ObjectStorage, StorageError, StorageResult, UploadLimits};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

const WRITE_CHUNK_SIZE: usize = 256 * 1024;

/// Local filesystem storage implementation
///
/// Objects are written to a hidden temporary file next to their final path
/// and renamed into place once complete, so readers never see partial files.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/filetask/objects")
    /// * `base_url` - Base URL for serving objects (e.g., "http://localhost:8000/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert an object key to a filesystem path below `base_path`
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(key);
        if !path.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.part", name, std::process::id()))
    }

    async fn write_to(
        &self,
        temp: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        max_size: u64,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(temp).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", temp.display(), e))
        })?;

        let mut total = 0u64;
        loop {
            let chunk = read_chunk(&mut *reader, WRITE_CHUNK_SIZE, &mut total, max_size).await?;
            if chunk.is_empty() {
                break;
            }
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to write file {}: {}", temp.display(), e))
            })?;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", temp.display(), e))
        })?;

        Ok(total)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn ensure_bucket(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        _content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        limits: UploadLimits,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();
        let temp = Self::temp_path(&path);

        let written = UploadDeadline::start(limits)
            .run(key, self.write_to(&temp, reader, limits.max_size))
            .await;

        let size = match written {
            Ok(size) => size,
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&temp).await {
                    tracing::warn!(
                        path = %temp.display(),
                        error = %remove_err,
                        "Failed to remove partial upload"
                    );
                }
                return Err(e);
            }
        };

        fs::rename(&temp, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(size)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::ReadBuf;

    fn limits(max_size: u64) -> UploadLimits {
        UploadLimits::new(max_size, Duration::from_secs(5))
    }

    /// Hands out `remaining` bytes, then never produces another one.
    struct StallingReader {
        remaining: usize,
    }

    impl AsyncRead for StallingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.remaining == 0 {
                return Poll::Pending;
            }
            let n = self.remaining.min(buf.remaining());
            buf.put_slice(&vec![9u8; n]);
            self.remaining -= n;
            Poll::Ready(Ok(()))
        }
    }

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:8000/files".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_put_stream() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = vec![42u8; 600 * 1024];
        let mut reader = &data[..];
        let size = storage
            .put_stream("uploads/01ABC.bin", "application/octet-stream", &mut reader, limits(1 << 20))
            .await
            .unwrap();

        assert_eq!(size, data.len() as u64);
        assert!(storage.exists("uploads/01ABC.bin").await.unwrap());
        let written = std::fs::read(dir.path().join("uploads/01ABC.bin")).unwrap();
        assert_eq!(written, data);
        assert_eq!(
            storage.public_url("uploads/01ABC.bin"),
            "http://localhost:8000/files/uploads/01ABC.bin"
        );
    }

    #[tokio::test]
    async fn test_oversized_stream_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = vec![1u8; 1024];
        let mut reader = &data[..];
        let result = storage
            .put_stream("uploads/big.bin", "application/octet-stream", &mut reader, limits(100))
            .await;

        assert!(matches!(result, Err(StorageError::PayloadTooLarge { .. })));
        assert!(!storage.exists("uploads/big.bin").await.unwrap());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut reader = &b"x"[..];
        let result = storage
            .put_stream("../../../etc/passwd", "text/plain", &mut reader, limits(10))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out_without_leftovers() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let mut reader = StallingReader {
            remaining: 300 * 1024,
        };
        let result = storage
            .put_stream(
                "uploads/stalled.bin",
                "application/octet-stream",
                &mut reader,
                UploadLimits::new(1 << 20, Duration::from_millis(200)),
            )
            .await;

        assert!(matches!(result, Err(StorageError::ConnectionFailure(_))));
        assert!(!storage.exists("uploads/stalled.bin").await.unwrap());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("uploads"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }
}
