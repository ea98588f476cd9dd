use crate::keys::task_key;
use crate::traits::{StoreError, StoreResult, TaskStore};
use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{Client, RedisError};
use async_trait::async_trait;
use filetask_core::{StoreConfig, Task, TaskId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Redis-backed task store
///
/// Holds `pool_size` multiplexed connections and hands them out round-robin.
/// Each connection reconnects on its own after transient failures.
pub struct RedisTaskStore {
    connections: RwLock<Vec<ConnectionManager>>,
    next: AtomicUsize,
    ttl: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
}

fn connection_error(err: RedisError) -> StoreError {
    StoreError::Connection(err.to_string())
}

/// Build a `redis://` URL from the address, password and database number.
pub(crate) fn connection_url(config: &StoreConfig) -> String {
    if config.addr.starts_with("redis://") || config.addr.starts_with("rediss://") {
        return config.addr.clone();
    }
    if config.password.is_empty() {
        format!("redis://{}/{}", config.addr, config.db)
    } else {
        format!(
            "redis://:{}@{}/{}",
            urlencoding::encode(&config.password),
            config.addr,
            config.db
        )
    }
}

fn manager_config(config: &StoreConfig) -> ConnectionManagerConfig {
    ConnectionManagerConfig::new()
        .set_number_of_retries(config.max_retries)
        .set_connection_timeout(config.dial_timeout)
        .set_response_timeout(config.read_timeout.max(config.write_timeout))
}

impl RedisTaskStore {
    /// Open the connection pool and verify the server answers `PING`.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::open(connection_url(config)).map_err(connection_error)?;
        let pool_size = config.pool_size.max(1);

        let mut connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let manager = tokio::time::timeout(
                config.dial_timeout,
                ConnectionManager::new_with_config(client.clone(), manager_config(config)),
            )
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "connecting to {} timed out after {:?}",
                    config.addr, config.dial_timeout
                ))
            })?
            .map_err(connection_error)?;
            connections.push(manager);
        }

        let store = RedisTaskStore {
            connections: RwLock::new(connections),
            next: AtomicUsize::new(0),
            ttl: config.task_ttl,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        };
        store.ping().await?;

        tracing::info!(
            addr = %config.addr,
            db = config.db,
            pool_size = pool_size,
            "Connected to Redis"
        );

        Ok(store)
    }

    async fn connection(&self) -> StoreResult<ConnectionManager> {
        let connections = self.connections.read().await;
        if connections.is_empty() {
            return Err(StoreError::Connection("task store is closed".to_string()));
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % connections.len();
        Ok(connections[idx].clone())
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = with_timeout(
            self.read_timeout,
            "PING",
            ::redis::cmd("PING").query_async(&mut conn),
        )
        .await?;
        Ok(())
    }
}

async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(connection_error),
        Err(_) => Err(StoreError::Connection(format!(
            "{} timed out after {:?}",
            operation, limit
        ))),
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn create(&self, task: &Task) -> StoreResult<()> {
        let key = task_key(&task.id);
        let data = serde_json::to_vec(task)?;
        let ttl_secs = self.ttl.as_secs().max(1);
        let start = std::time::Instant::now();

        let mut conn = self.connection().await?;
        let _: () = with_timeout(
            self.write_timeout,
            "SET",
            ::redis::cmd("SET")
                .arg(&key)
                .arg(data)
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn),
        )
        .await?;

        tracing::debug!(
            key = %key,
            ttl_secs = ttl_secs,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Task saved"
        );
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> StoreResult<Task> {
        let key = task_key(id);
        let mut conn = self.connection().await?;

        let data: Option<Vec<u8>> = with_timeout(
            self.read_timeout,
            "GET",
            ::redis::cmd("GET").arg(&key).query_async(&mut conn),
        )
        .await?;

        match data {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(StoreError::NotFound(*id)),
        }
    }

    async fn close(&self) -> StoreResult<()> {
        let mut connections = self.connections.write().await;
        if !connections.is_empty() {
            tracing::info!(connections = connections.len(), "Closing Redis connections");
        }
        connections.clear();
        Ok(())
    }
}
