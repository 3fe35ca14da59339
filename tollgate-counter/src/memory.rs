//! In-memory counter backend.
//!
//! Process-local and thread-safe. Several [`CounterClient`](crate::CounterClient)s
//! sharing one `Arc<MemoryBackend>` behave like processes sharing one Redis.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use tollgate_core::error::{GuardError, Result};
use tollgate_core::traits::CounterBackend;

/// In-memory counter backend.
#[derive(Debug)]
pub struct MemoryBackend {
    values: DashMap<String, Vec<u8>>,
    /// Operations served, successful or not
    operations: AtomicU64,
    available: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty, available backend.
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            operations: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates an outage: while unavailable every operation fails with
    /// [`GuardError::StoreUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of operations attempted against this backend.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn begin(&self) -> Result<()> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GuardError::StoreUnavailable("memory backend marked unavailable".into()))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.begin()?;
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.begin()?;
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.begin()?;

        // The entry guard holds the shard lock, making read-modify-write atomic
        let mut entry = self.values.entry(key.to_string()).or_insert_with(|| b"0".to_vec());
        let current = std::str::from_utf8(entry.value())
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| GuardError::InvalidCounterValue {
                key: key.to_string(),
                value: String::from_utf8_lossy(entry.value()).into_owned(),
            })?;

        let next = current.checked_add(1).ok_or_else(|| GuardError::InvalidCounterValue {
            key: key.to_string(),
            value: format!("{} (increment would overflow)", current),
        })?;
        *entry.value_mut() = next.to_string().into_bytes();
        debug!(key, value = next, "Incremented counter");
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.begin()?;
        self.values.remove(key);
        Ok(())
    }
}
