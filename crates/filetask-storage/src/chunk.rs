use crate::traits::{StorageError, StorageResult, UploadLimits};
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

/// Read up to `chunk_size` bytes, adding them to `total`.
///
/// A short (or empty) chunk means the reader hit EOF. A reader failing with
/// [`io::ErrorKind::FileTooLarge`] ran into a limit upstream of the backend
/// (the HTTP body limit) and is reported as `PayloadTooLarge`.
pub(crate) async fn read_chunk<R>(
    reader: &mut R,
    chunk_size: usize,
    total: &mut u64,
    max_size: u64,
) -> StorageResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(chunk_size.min(1024 * 1024));
    let read = (&mut *reader)
        .take(chunk_size as u64)
        .read_to_end(&mut buf)
        .await;

    *total += buf.len() as u64;
    match read {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::FileTooLarge => {
            return Err(StorageError::PayloadTooLarge {
                size: (*total).max(max_size.saturating_add(1)),
                limit: max_size,
            });
        }
        Err(e) => return Err(StorageError::StreamRead(e)),
    }

    if *total > max_size {
        return Err(StorageError::PayloadTooLarge {
            size: *total,
            limit: max_size,
        });
    }

    Ok(buf)
}

/// Deadline shared by every step of one upload
#[derive(Debug, Clone, Copy)]
pub(crate) struct UploadDeadline {
    at: Instant,
    limits: UploadLimits,
}

impl UploadDeadline {
    pub(crate) fn start(limits: UploadLimits) -> Self {
        Self {
            at: Instant::now() + limits.timeout,
            limits,
        }
    }

    pub(crate) fn max_size(&self) -> u64 {
        self.limits.max_size
    }

    /// Drive `step` until the deadline. Running out of time drops `step` and
    /// yields a `ConnectionFailure`, leaving the caller free to clean up.
    pub(crate) async fn run<T, F>(&self, key: &str, step: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        tokio::time::timeout_at(self.at, step)
            .await
            .unwrap_or_else(|_| Err(StorageError::timed_out(key, self.limits.timeout)))
    }
}
