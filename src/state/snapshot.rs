//! Best-effort persistence of the last known record list.
//!
//! The snapshot only exists to paint something on a cold start before the
//! first network response. It is never a source of truth, and a failed
//! read or write is logged and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::market_data::types::MarketRecord;
use crate::metrics::prometheus;

/// Key under which the record list is stored.
pub const SNAPSHOT_KEY: &str = "market_records";

/// String values under named keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        // write-then-rename so a crash never leaves a half-written snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

/// Process-local store, for runs without a snapshot directory.
#[derive(Default)]
pub struct MemoryStore {
    items: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }
}

/// Reads and writes the record list as one JSON blob.
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn on_disk(dir: &Path) -> Self {
        Self::new(FileStore::new(dir))
    }

    /// Last saved records, or nothing if there is no usable snapshot.
    pub async fn load(&self) -> Vec<MarketRecord> {
        let raw = match self.backend.get_item(SNAPSHOT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no market snapshot stored yet");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %err, "failed to read market snapshot");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<MarketRecord>>(&raw) {
            Ok(records) => {
                debug!(count = records.len(), "loaded market snapshot");
                records
            }
            Err(err) => {
                warn!(error = %err, "discarding unreadable market snapshot");
                Vec::new()
            }
        }
    }

    pub async fn save(&self, records: &[MarketRecord]) -> anyhow::Result<()> {
        let raw = serde_json::to_string(records).context("serializing market snapshot")?;
        self.backend.set_item(SNAPSHOT_KEY, raw).await
    }
}

/// Hands snapshots to a background task so callers never wait on storage.
///
/// Bursts coalesce: the task always writes the newest list it has been
/// given and skips anything older that it did not get to in time.
pub struct SnapshotWriter {
    tx: Mutex<Option<watch::Sender<Arc<Vec<MarketRecord>>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotWriter {
    /// Must be called inside a Tokio runtime.
    pub fn spawn(store: SnapshotStore) -> Self {
        let (tx, rx) = watch::channel(Arc::new(Vec::new()));
        let task = tokio::spawn(run_snapshot_writer(rx, store));
        Self {
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn save(&self, records: Arc<Vec<MarketRecord>>) {
        match self.tx.lock().as_ref() {
            Some(tx) => {
                tx.send_replace(records);
            }
            None => debug!("snapshot writer already stopped, dropping snapshot"),
        }
    }

    /// Writes whatever is still queued, then stops the task.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "snapshot writer task failed");
            }
        }
    }
}

async fn run_snapshot_writer(mut rx: watch::Receiver<Arc<Vec<MarketRecord>>>, store: SnapshotStore) {
    while rx.changed().await.is_ok() {
        let records = rx.borrow_and_update().clone();

        match store.save(&records).await {
            Ok(()) => {
                debug!(count = records.len(), "market snapshot saved");
                prometheus::record_snapshot_write("ok");
            }
            Err(err) => {
                warn!(error = %err, "failed to save market snapshot");
                prometheus::record_snapshot_write("error");
            }
        }
    }

    debug!("snapshot writer stopped");
}
