use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use truthmeter_common::Result;

use super::RecordStorage;

/// Process-local records. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }
}
