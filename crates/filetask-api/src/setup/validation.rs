//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use filetask_core::{Config, QueueBackend, StorageBackend, StoreBackend};

/// Validate critical configuration values
///
/// Hard errors come from [`Config::validate`]; the checks here only warn about
/// settings that work but are unlikely to be intended.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    let is_production = config.is_production();

    if is_production {
        if config.storage.backend == StorageBackend::Memory {
            tracing::warn!("In-memory object storage in production - uploads are lost on restart");
        }
        if config.store.backend == StoreBackend::Memory {
            tracing::warn!("In-memory task store in production - task state is lost on restart");
        }
        if config.queue.backend == QueueBackend::Memory {
            tracing::warn!("In-memory queue in production - no consumer will see published tasks");
        }
    }

    if config.storage.chunk_upload_size as u64 > config.storage.max_upload_size {
        tracing::warn!(
            chunk_upload_size = config.storage.chunk_upload_size,
            max_upload_size = config.storage.max_upload_size,
            "Chunk size exceeds max upload size - every upload will be single-shot"
        );
    }

    if config.storage.backend == StorageBackend::S3
        && (config.storage.access_key_id.is_empty() || config.storage.secret_access_key.is_empty())
    {
        tracing::warn!("S3 credentials not set - falling back to the default AWS credential chain");
    }

    Ok(())
}
