//! Persistent store adapters.
//!
//! The whole [`QueueState`] is stored as one JSON record under a single key.
//! Adapters give no transactional guarantees; read-modify-write sequences are
//! serialized by the queue owner.

use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use watch_queue_config::{Config, PathManager, StoreBackend};
use watch_queue_models::{now_millis, QueueState};
use crate::error::{QueueError, Result};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Stored state, or an empty state stamped `now` when nothing is stored yet
    async fn read(&self) -> Result<QueueState>;

    /// Overwrite the stored state
    async fn write(&self, state: &QueueState) -> Result<()>;
}

/// File-backed store, the extension-local store of the owning context.
///
/// Holds an exclusive advisory lock on the store for its whole lifetime, so at
/// most one process owns a given queue file at a time.
pub struct FileStore {
    path: PathBuf,
    lock: File,
}

impl FileStore {
    /// Open the store file for `key` inside `dir`, refusing immediately when
    /// another owner holds it
    pub fn open(dir: &Path, key: &str) -> Result<Self> {
        Self::open_waiting(dir, key, Duration::ZERO)
    }

    /// Open the store file for `key` inside `dir`, waiting up to `wait` for
    /// another owner to let go of it.
    ///
    /// Fails with `StorageUnavailable` when the directory cannot be created or
    /// written to, or when the store is still locked after `wait`.
    pub fn open_waiting(dir: &Path, key: &str, wait: Duration) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(QueueError::StorageUnavailable("store key is empty".to_string()));
        }

        std::fs::create_dir_all(dir).map_err(|e| {
            QueueError::StorageUnavailable(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let scratch = dir.join(format!(".{}.write-check", key));
        std::fs::write(&scratch, b"")
            .and_then(|_| std::fs::remove_file(&scratch))
            .map_err(|e| {
                QueueError::StorageUnavailable(format!("{} is not writable: {}", dir.display(), e))
            })?;

        let lock = acquire_lock(&dir.join(format!(".{}.lock", key)), wait)?;
        let path = dir.join(format!("{}.json", key));
        debug!("File store opened at {:?}", path);
        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}

fn acquire_lock(path: &Path, wait: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            QueueError::StorageUnavailable(format!("cannot open lock {}: {}", path.display(), e))
        })?;

    let start = Instant::now();
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => return Ok(file),
            Err(e) if start.elapsed() >= wait => {
                return Err(QueueError::StorageUnavailable(format!(
                    "{} is held by another queue owner: {}",
                    path.display(),
                    e
                )));
            }
            Err(_) => std::thread::sleep(Duration::from_millis(10)),
        }
    }
}

#[async_trait]
impl QueueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self) -> Result<QueueState> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let state: QueueState = serde_json::from_slice(&bytes)?;
                debug!("Store read: {} items from {:?}", state.items.len(), self.path);
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store miss: {:?} does not exist yet", self.path);
                Ok(QueueState::empty(now_millis()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, state: &QueueState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!("Store saved: {} items to {:?}", state.items.len(), self.path);
        Ok(())
    }
}

/// In-process store: the page-local store of a single context, and the fake
/// used in tests. Clones share the same underlying map.
#[derive(Clone)]
pub struct MemoryStore {
    key: String,
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Raw JSON currently stored under this store's key
    pub fn raw(&self) -> Option<String> {
        self.records.lock().get(&self.key).cloned()
    }

    /// Replace the raw record, bypassing serialization
    pub fn put_raw(&self, json: impl Into<String>) {
        self.records.lock().insert(self.key.clone(), json.into());
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self) -> Result<QueueState> {
        let raw = self.records.lock().get(&self.key).cloned();
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(QueueState::empty(now_millis())),
        }
    }

    async fn write(&self, state: &QueueState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.records.lock().insert(self.key.clone(), json);
        Ok(())
    }
}

/// Build the store selected in configuration
pub fn open_store(config: &Config, paths: &PathManager) -> Result<Arc<dyn QueueStore>> {
    let store: Arc<dyn QueueStore> = match config.store.backend {
        StoreBackend::File => Arc::new(FileStore::open_waiting(
            paths.data_dir(),
            &config.store.key,
            config.store.lock_timeout(),
        )?),
        StoreBackend::Memory => Arc::new(MemoryStore::new(config.store.key.clone())),
    };
    info!(store = store.name(), key = %config.store.key, "Queue store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_queue_models::{QueueItem, StreamingService};

    fn sample_state() -> QueueState {
        let mut state = QueueState::empty(10);
        state.items.push(QueueItem::movie("m1", "Heat", "/watch/1", StreamingService::Netflix));
        state
    }

    #[tokio::test]
    async fn test_file_store_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "queue").unwrap();
        let before = now_millis();
        let state = store.read().await.unwrap();
        assert!(state.items.is_empty());
        assert!(state.last_updated >= before);
    }

    #[tokio::test]
    async fn test_file_store_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "queue").unwrap();
        store.write(&sample_state()).await.unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path(), "queue").unwrap();
        assert_eq!(reopened.read().await.unwrap(), sample_state());
        assert!(!dir.path().join("queue.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "queue").unwrap();
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.read().await.unwrap_err();
        assert!(err.is_store_io());
    }

    #[test]
    fn test_file_store_unavailable_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let result = FileStore::open(&blocker.join("data"), "queue");
        assert!(matches!(result, Err(QueueError::StorageUnavailable(_))));

        let result = FileStore::open(dir.path(), " ");
        assert!(matches!(result, Err(QueueError::StorageUnavailable(_))));
    }

    #[test]
    fn test_file_store_single_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "queue").unwrap();

        let second = FileStore::open(dir.path(), "queue");
        assert!(matches!(second, Err(QueueError::StorageUnavailable(_))));
        let waited = FileStore::open_waiting(dir.path(), "queue", Duration::from_millis(30));
        assert!(matches!(waited, Err(QueueError::StorageUnavailable(_))));

        // other keys in the same directory are separate stores
        FileStore::open(dir.path(), "other").unwrap();

        drop(store);
        FileStore::open(dir.path(), "queue").unwrap();
    }

    #[test]
    fn test_file_store_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), "queue").unwrap();
        let holder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(store);
        });

        let reopened = FileStore::open_waiting(dir.path(), "queue", Duration::from_secs(5));
        assert!(reopened.is_ok());
        holder.join().unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_records() {
        let store = MemoryStore::new("queue");
        let other = store.clone();
        store.write(&sample_state()).await.unwrap();
        assert_eq!(other.read().await.unwrap(), sample_state());
        assert!(other.raw().unwrap().contains("\"lastUpdated\":10"));
    }

    #[tokio::test]
    async fn test_open_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path());
        let mut config = Config::default();

        let store = open_store(&config, &paths).unwrap();
        assert_eq!(store.name(), "file");
        store.write(&sample_state()).await.unwrap();
        assert!(paths.store_file(&config.store.key).exists());

        config.store.backend = StoreBackend::Memory;
        assert_eq!(open_store(&config, &paths).unwrap().name(), "memory");
    }
}
