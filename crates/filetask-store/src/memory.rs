//! In-memory task store with expiry, for tests and infrastructure-free local runs.

use crate::keys::task_key;
use crate::traits::{StoreError, StoreResult, TaskStore};
use async_trait::async_trait;
use filetask_core::{Task, TaskId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct Record {
    data: Vec<u8>,
    expires_at: Instant,
}

/// Stores the serialized JSON exactly as the Redis backend would.
#[derive(Clone)]
pub struct MemoryTaskStore {
    records: Arc<Mutex<HashMap<String, Record>>>,
    ttl: Duration,
    unavailable: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryTaskStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            unavailable: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail with `Connection`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live (unexpired) records
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|r| r.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records held in memory, expired ones included
    pub fn stored_records(&self) -> usize {
        self.lock().len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("task store is closed".to_string()));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(
                "memory task store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: &Task) -> StoreResult<()> {
        self.check_available()?;
        let data = serde_json::to_vec(task)?;
        let now = Instant::now();
        let mut records = self.lock();
        // records that are never read again would otherwise stay forever
        records.retain(|_, record| record.expires_at > now);
        records.insert(
            task_key(&task.id),
            Record {
                data,
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> StoreResult<Task> {
        self.check_available()?;
        let key = task_key(id);
        let mut records = self.lock();

        let expired = match records.get(&key) {
            Some(record) if record.expires_at > Instant::now() => {
                return Ok(serde_json::from_slice(&record.data)?);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            records.remove(&key);
        }
        Err(StoreError::NotFound(*id))
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
