//! Detection record persistence
//!
//! Records are appended to `detections.jsonl`, one JSON object per line.
//! The file is replayed into memory when the store opens, so history
//! queries never touch the disk.

use crate::records::{DetectionRecord, HistoryQuery};
use crate::store::DetectionStore;
use async_trait::async_trait;
use leafscan_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the record log inside `records_dir`
pub const RECORDS_FILE: &str = "detections.jsonl";

/// Configuration for record persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the record log
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,

    /// Flush to disk after this many records
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            flush_interval: default_flush_interval(),
        }
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("./records")
}

fn default_flush_interval() -> usize {
    1
}

impl PersistenceConfig {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
            ..Default::default()
        }
    }

    pub fn records_path(&self) -> PathBuf {
        self.records_dir.join(RECORDS_FILE)
    }
}

/// Buffered line writer; a line counts as written once it is buffered
struct RecordWriter<W: Write> {
    out: BufWriter<W>,
    since_flush: usize,
}

impl<W: Write> RecordWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
            since_flush: 0,
        }
    }

    /// Buffer one line and flush every `flush_interval` lines.
    ///
    /// A failed flush keeps the lines buffered for the next attempt.
    fn append(&mut self, line: &[u8], flush_interval: usize) -> Result<()> {
        self.out
            .write_all(line)
            .map_err(|e| Error::storage(format!("Failed to append record: {}", e)))?;
        self.since_flush += 1;

        if self.since_flush >= flush_interval {
            match self.out.flush() {
                Ok(()) => self.since_flush = 0,
                Err(e) => warn!(
                    pending = self.since_flush,
                    "Failed to flush detection records, retrying on next write: {}", e
                ),
            }
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| Error::storage(format!("Failed to flush records: {}", e)))?;
        self.since_flush = 0;
        Ok(())
    }
}

/// Append-only JSON-lines store
pub struct JsonlStore {
    config: PersistenceConfig,
    path: PathBuf,
    writer: Arc<Mutex<RecordWriter<File>>>,
    records: Arc<RwLock<Vec<DetectionRecord>>>,
}

impl JsonlStore {
    /// Open (or create) the record log and replay existing records
    pub fn open(config: PersistenceConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.records_dir).map_err(|e| {
            Error::storage(format!(
                "Failed to create {}: {}",
                config.records_dir.display(),
                e
            ))
        })?;

        let path = config.records_path();
        let records = if path.exists() {
            load_records(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(format!("Failed to open {}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            records = records.len(),
            "Opened detection record log"
        );

        Ok(Self {
            config,
            path,
            writer: Arc::new(Mutex::new(RecordWriter::new(file))),
            records: Arc::new(RwLock::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every parseable record; malformed lines are skipped
fn load_records(path: &Path) -> Result<Vec<DetectionRecord>> {
    let file = File::open(path)
        .map_err(|e| Error::storage(format!("Failed to read {}: {}", path.display(), e)))?;

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DetectionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = number + 1, "Skipping malformed detection record: {}", e),
        }
    }

    debug!(path = %path.display(), count = records.len(), "Replayed detection records");
    Ok(records)
}

#[async_trait]
impl DetectionStore for JsonlStore {
    async fn insert(&self, record: DetectionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let writer = Arc::clone(&self.writer);
        let records = Arc::clone(&self.records);
        let flush_interval = self.config.flush_interval;

        // Index under the writer lock so replay order matches insert order
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut writer = writer.lock();
            writer.append(&line, flush_interval)?;
            records.write().push(record);
            Ok(())
        })
        .await
        .map_err(|e| Error::storage(format!("Record writer task failed: {}", e)))?
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<DetectionRecord>> {
        Ok(query.select(&self.records.read()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    async fn flush(&self) -> Result<()> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut writer = writer.lock();
            writer.flush()
        })
        .await
        .map_err(|e| Error::storage(format!("Record writer task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

impl Drop for JsonlStore {
    fn drop(&mut self) {
        if let Err(e) = self.writer.lock().flush() {
            warn!("Failed to flush detection records on close: {}", e);
        }
    }
}
