use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use truthmeter_common::{Result, TruthMeterError};

use super::RecordStorage;

/// Records kept in one JSON object file, `{ "<key>": "<value>", ... }`.
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                TruthMeterError::Persistence(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    async fn store(&self, records: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        let body = serde_json::to_vec_pretty(records)
            .map_err(|e| TruthMeterError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> TruthMeterError {
    TruthMeterError::Persistence(format!("{}: {e}", path.display()))
}

#[async_trait]
impl RecordStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let records = self.load().await?;
        Ok(records.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut records = self.load().await?;
        records.insert(key.to_string(), Value::String(value.to_string()));
        self.store(&records).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut records = self.load().await?;
        if records.remove(key).is_some() {
            self.store(&records).await?;
        }
        Ok(())
    }
}
