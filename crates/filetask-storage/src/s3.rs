use crate::chunk::{read_chunk, UploadDeadline};
use crate::traits::{ObjectStorage, StorageError, StorageResult, UploadLimits};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use filetask_core::StorageConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;

const BUCKET_WAIT_ATTEMPTS: u32 = 20;
const BUCKET_WAIT_INTERVAL: Duration = Duration::from_millis(500);

/// S3 storage implementation
///
/// Uses path-style addressing so the same client works against AWS and
/// S3-compatible providers (MinIO, Yandex Object Storage, ...).
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    chunk_size: usize,
    concurrency: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Explicit access keys take precedence; without them the default AWS
    /// credential chain is used.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError(
                "S3 bucket not configured".to_string(),
            ));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if !config.access_key_id.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "filetask-config",
            ));
        }

        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
        if let Some(endpoint) = config.endpoint_url() {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self::from_client(Client::from_conf(builder.build()), config))
    }

    /// Wrap an already configured client; bucket and upload tuning come from `config`
    pub fn from_client(client: Client, config: &StorageConfig) -> Self {
        S3Storage {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url(),
            chunk_size: config.chunk_upload_size.max(1),
            concurrency: config.upload_concurrency.max(1),
        }
    }

    /// Read up to two chunks. A single chunk fits one `PutObject`.
    async fn read_head(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        total: &mut u64,
        max_size: u64,
    ) -> StorageResult<Vec<Vec<u8>>> {
        let first = read_chunk(&mut *reader, self.chunk_size, total, max_size).await?;
        let full = first.len() == self.chunk_size;
        let mut buffered = vec![first];
        if full {
            let second = read_chunk(&mut *reader, self.chunk_size, total, max_size).await?;
            if !second.is_empty() {
                buffered.push(second);
            }
        }
        Ok(buffered)
    }

    async fn bucket_accessible(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }

    async fn wait_for_bucket(&self) -> StorageResult<()> {
        for _ in 0..BUCKET_WAIT_ATTEMPTS {
            if self.bucket_accessible().await {
                return Ok(());
            }
            tokio::time::sleep(BUCKET_WAIT_INTERVAL).await;
        }
        Err(StorageError::ConnectionFailure(format!(
            "bucket {} did not become available",
            self.bucket
        )))
    }

    async fn put_single(&self, key: &str, content_type: &str, data: Vec<u8>) -> StorageResult<()> {
        let len = data.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(len)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify_sdk_error("put object", e))?;
        Ok(())
    }

    /// Upload every remaining chunk as a part, keeping at most `concurrency`
    /// parts in flight. Returning early drops the JoinSet, which aborts the
    /// parts still running.
    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        buffered: Vec<Vec<u8>>,
        total: &mut u64,
        max_size: u64,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut pending: VecDeque<Vec<u8>> = buffered.into();
        let mut in_flight = JoinSet::new();
        let mut parts = Vec::new();
        let mut part_number: i32 = 0;
        let mut eof = false;

        loop {
            while in_flight.len() < self.concurrency {
                let chunk = match pending.pop_front() {
                    Some(chunk) => chunk,
                    None if eof => break,
                    None => {
                        let chunk = read_chunk(&mut *reader, self.chunk_size, total, max_size).await?;
                        if chunk.is_empty() {
                            eof = true;
                            break;
                        }
                        chunk
                    }
                };

                part_number += 1;
                in_flight.spawn(upload_part(
                    self.client.clone(),
                    self.bucket.clone(),
                    key.to_string(),
                    upload_id.to_string(),
                    part_number,
                    chunk,
                ));
            }

            match in_flight.join_next().await {
                Some(Ok(Ok(part))) => parts.push(part),
                Some(Ok(Err(e))) => return Err(e),
                Some(Err(join_err)) => {
                    return Err(StorageError::UploadFailed(format!(
                        "part upload task failed: {}",
                        join_err
                    )))
                }
                None => break,
            }
        }

        parts.sort_by_key(|p| p.part_number());
        Ok(parts)
    }

    async fn put_multipart(
        &self,
        key: &str,
        content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        buffered: Vec<Vec<u8>>,
        total: &mut u64,
        deadline: UploadDeadline,
    ) -> StorageResult<()> {
        let created = deadline
            .run(key, async {
                self.client
                    .create_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .content_type(content_type)
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error("create multipart upload", e))
            })
            .await?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("missing multipart upload id".to_string()))?
            .to_string();

        // The deadline covers parts and completion; the abort below runs outside it.
        let result = deadline
            .run(key, async {
                let parts = self
                    .upload_parts(key, &upload_id, reader, buffered, total, deadline.max_size())
                    .await?;
                let part_count = parts.len();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error("complete multipart upload", e))?;
                tracing::debug!(key = %key, parts = part_count, "Multipart upload completed");
                Ok::<_, StorageError>(())
            })
            .await;

        if result.is_err() {
            self.abort_multipart(key, &upload_id).await;
        }
        result
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(
                error = %DisplayErrorContext(&e),
                bucket = %self.bucket,
                key = %key,
                upload_id = %upload_id,
                "Failed to abort multipart upload"
            );
        }
    }
}

async fn upload_part(
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    part_number: i32,
    chunk: Vec<u8>,
) -> StorageResult<CompletedPart> {
    let output = client
        .upload_part()
        .bucket(bucket)
        .key(key)
        .upload_id(upload_id)
        .part_number(part_number)
        .body(ByteStream::from(chunk))
        .send()
        .await
        .map_err(|e| classify_sdk_error("upload part", e))?;

    Ok(CompletedPart::builder()
        .set_e_tag(output.e_tag().map(String::from))
        .part_number(part_number)
        .build())
}

fn is_quota_code(code: &str) -> bool {
    code.contains("Quota") || code.contains("StorageFull") || code == "TooManyBuckets"
}

/// Map an SDK error onto the storage error kinds.
fn classify_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{}: {}", operation, DisplayErrorContext(&err));
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            StorageError::ConnectionFailure(message)
        }
        _ => match err.code() {
            Some(code) if is_quota_code(code) => StorageError::QuotaExceeded(message),
            _ => StorageError::UploadFailed(message),
        },
    }
}

/// Public URL for an object
///
/// For AWS S3: https://{bucket}.s3.{region}.amazonaws.com/{key}
/// For S3-compatible providers (path-style): {endpoint}/{bucket}/{key}
fn object_url(endpoint_url: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint_url {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn ensure_bucket(&self) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);

        // us-east-1 is the implicit default and rejects an explicit constraint.
        if self.endpoint_url.is_none() && self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, region = %self.region, "S3 bucket created");
                if self.endpoint_url.is_none() {
                    self.wait_for_bucket().await?;
                }
                Ok(())
            }
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_bucket_already_owned_by_you() {
                        tracing::info!(bucket = %self.bucket, "S3 bucket already exists");
                        return Ok(());
                    }
                    if service_err.is_bucket_already_exists() {
                        if self.bucket_accessible().await {
                            tracing::info!(bucket = %self.bucket, "S3 bucket already exists and is accessible");
                            return Ok(());
                        }
                        return Err(StorageError::BucketConflict(self.bucket.clone()));
                    }
                }
                Err(classify_sdk_error("create bucket", err))
            }
        }
    }

    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        limits: UploadLimits,
    ) -> StorageResult<u64> {
        let start = std::time::Instant::now();
        let deadline = UploadDeadline::start(limits);
        let mut total = 0u64;

        let head = deadline
            .run(key, self.read_head(&mut *reader, &mut total, limits.max_size))
            .await;
        let result = match head {
            Ok(mut buffered) if buffered.len() == 1 => {
                let data = buffered.pop().unwrap_or_default();
                deadline
                    .run(key, self.put_single(key, content_type, data))
                    .await
            }
            Ok(buffered) => {
                self.put_multipart(key, content_type, reader, buffered, &mut total, deadline)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = total,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stream upload failed"
            );
            return Err(e);
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(total)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(classify_sdk_error("head object", err))
                }
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        object_url(self.endpoint_url.as_deref(), &self.bucket, &self.region, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
