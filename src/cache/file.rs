//! File-based cache backend — one JSON store file per instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{ClientError, Result};

use super::{CacheBackend, CacheOptions};

/// Name of the store file inside the configured directory.
const STORE_FILE: &str = "entries.json";

/// Persistent store serialized to JSON.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStore {
    entries: HashMap<String, Value>,
}

/// Cache backend persisting entries to a JSON file under a directory.
///
/// A corrupt store file is treated as empty rather than an error, so a
/// damaged cache degrades to a cold one. Every mutation rewrites the
/// whole file.
pub struct FileCache {
    path: PathBuf,
    store: Mutex<FileStore>,
    options: CacheOptions,
}

impl FileCache {
    /// Open (or create) a file cache rooted at `dir`.
    pub fn open(dir: PathBuf, options: CacheOptions) -> Result<Self> {
        std::fs::create_dir_all(&dir).map_err(|e| {
            ClientError::Cache(format!(
                "failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        let path = dir.join(STORE_FILE);
        let store = Self::load_from_disk(&path)?;
        Ok(Self {
            path,
            store: Mutex::new(store),
            options,
        })
    }

    /// Number of entries currently stored.
    pub async fn entry_count(&self) -> usize {
        self.store.lock().await.entries.len()
    }

    fn load_from_disk(path: &Path) -> Result<FileStore> {
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(store) => Ok(store),
                Err(e) => {
                    warn!("cache store file is corrupt, starting empty: {}", e);
                    Ok(FileStore::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileStore::default()),
            Err(e) => Err(ClientError::Cache(format!(
                "failed to read cache store {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn save_to_disk(&self, store: &FileStore) -> Result<()> {
        let data = serde_json::to_string_pretty(store)
            .map_err(|e| ClientError::Cache(format!("failed to encode cache store: {e}")))?;
        std::fs::write(&self.path, data).map_err(|e| {
            ClientError::Cache(format!(
                "failed to write cache store {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let store = self.store.lock().await;
        Ok(store.entries.get(&self.options.prefixed(key)).cloned())
    }

    async fn save(&self, value: &Value, key: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        store
            .entries
            .insert(self.options.prefixed(key), value.clone());
        self.save_to_disk(&store)
    }

    async fn flush(&self) -> Result<()> {
        let mut store = self.store.lock().await;
        store.entries.clear();
        self.save_to_disk(&store)
    }
}
