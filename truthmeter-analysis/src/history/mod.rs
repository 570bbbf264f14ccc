//! Bounded, newest-first analysis history.
//!
//! The whole history lives as one JSON array under a single key of a
//! [`RecordStorage`], the same shape a browser key/value store would hold.
//! [`RecordHistory`] layers the cap and the failure policy on top: storage
//! errors are logged and then treated as "no history" on read and as a
//! dropped entry on write. They never reach the caller.

mod file;
mod memory;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use truthmeter_common::{Result, TruthMeterError};
use truthmeter_config::{HistoryBackend, HistoryConfig};

use crate::model::AnalysisHistoryEntry;

/// Keyed string records. Backends report failures as `Persistence` errors.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Insert at the front, evicting the oldest entries past capacity.
    async fn append(&self, entry: AnalysisHistoryEntry);
    /// All entries, newest first.
    async fn list(&self) -> Vec<AnalysisHistoryEntry>;
    async fn clear(&self);
}

pub struct RecordHistory<S> {
    storage: S,
    key: String,
    capacity: usize,
    // serialises read-modify-write in `append`
    write_lock: Mutex<()>,
}

impl<S: RecordStorage> RecordHistory<S> {
    pub fn new(storage: S, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            storage,
            key: key.into(),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn load(&self) -> Result<Vec<AnalysisHistoryEntry>> {
        match self.storage.read(&self.key).await? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| TruthMeterError::Persistence(format!("corrupt history record: {e}"))),
        }
    }

    async fn try_append(&self, entry: AnalysisHistoryEntry) -> Result<usize> {
        let mut entries = self.load().await?;
        entries.insert(0, entry);
        entries.truncate(self.capacity);
        let raw = serde_json::to_string(&entries)
            .map_err(|e| TruthMeterError::Persistence(e.to_string()))?;
        self.storage.write(&self.key, &raw).await?;
        Ok(entries.len())
    }
}

#[async_trait]
impl<S: RecordStorage> HistoryStore for RecordHistory<S> {
    async fn append(&self, entry: AnalysisHistoryEntry) {
        let _guard = self.write_lock.lock().await;
        let id = entry.id.clone();
        match self.try_append(entry).await {
            Ok(len) => tracing::debug!(entry_id = %id, len, "history.append"),
            Err(e) => tracing::warn!(entry_id = %id, error = %e, "history.append.dropped"),
        }
    }

    async fn list(&self) -> Vec<AnalysisHistoryEntry> {
        self.load().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "history.list.unreadable");
            Vec::new()
        })
    }

    async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.storage.remove(&self.key).await {
            tracing::warn!(error = %e, "history.clear.failed");
        }
    }
}

/// Open the history store selected by `config`.
pub async fn open_history(config: &HistoryConfig) -> Result<Arc<dyn HistoryStore>> {
    let store: Arc<dyn HistoryStore> = match config.backend {
        HistoryBackend::Memory => Arc::new(RecordHistory::new(
            MemoryStorage::new(),
            &config.key,
            config.capacity,
        )),
        HistoryBackend::File => Arc::new(RecordHistory::new(
            FileStorage::new(config.resolved_path()),
            &config.key,
            config.capacity,
        )),
        HistoryBackend::Sqlite => Arc::new(RecordHistory::new(
            SqliteStorage::open(&config.resolved_path()).await?,
            &config.key,
            config.capacity,
        )),
    };
    tracing::info!(backend = ?config.backend, capacity = config.capacity, "history.open");
    Ok(store)
}
