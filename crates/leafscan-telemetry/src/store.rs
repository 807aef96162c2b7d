//! Detection history storage

use crate::persistence::{JsonlStore, PersistenceConfig};
use crate::records::{DetectionRecord, HistoryQuery};
use async_trait::async_trait;
use leafscan_core::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage for detection records
#[async_trait]
pub trait DetectionStore: Send + Sync {
    /// Persist one record
    async fn insert(&self, record: DetectionRecord) -> Result<()>;

    /// Records matching a query, newest first
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<DetectionRecord>>;

    /// Total number of stored records
    async fn count(&self) -> Result<usize>;

    /// Push buffered writes to durable storage
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Store name, for logs
    fn name(&self) -> &str;
}

/// Volatile store; records are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<DetectionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DetectionStore for MemoryStore {
    async fn insert(&self, record: DetectionRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<DetectionRecord>> {
        Ok(query.select(&self.records.read()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Which store backs the detection history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    Jsonl(PersistenceConfig),
}

impl StorageConfig {
    /// Open the configured store
    pub fn build(&self) -> Result<Arc<dyn DetectionStore>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryStore::new())),
            Self::Jsonl(config) => Ok(Arc::new(JsonlStore::open(config.clone())?)),
        }
    }
}
