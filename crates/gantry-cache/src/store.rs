//! Cache store implementations.

use crate::keys::sanitize_key;
use async_trait::async_trait;
use gantry_core::cache::{ArtifactSet, CacheKey};
use gantry_core::ports::CacheStore;
use gantry_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Filesystem-backed store: one JSON manifest per key.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    fn key_path(&self, key: &CacheKey) -> PathBuf {
        self.root_dir
            .join(format!("{}.json", sanitize_key(key.as_str())))
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<ArtifactSet>> {
        let path = self.key_path(key);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::CacheStore(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let entry: ArtifactSet = serde_json::from_slice(&contents)
            .map_err(|e| Error::CacheStore(format!("Corrupt cache entry {}: {}", key, e)))?;
        debug!(key = %key, "Cache entry found");
        Ok(Some(entry))
    }

    async fn put(&self, key: &CacheKey, artifacts: ArtifactSet) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| Error::CacheStore(format!("Failed to create cache dir: {}", e)))?;

        let path = self.key_path(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(&artifacts)?;

        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| Error::CacheStore(format!("Failed to write cache: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::CacheStore(format!("Failed to write cache: {}", e)))?;

        debug!(key = %key, path = %path.display(), "Cache entry stored");
        Ok(())
    }
}

/// In-process store, shared by every run using the same instance.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, ArtifactSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<ArtifactSet>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, artifacts: ArtifactSet) -> Result<()> {
        self.entries.write().await.insert(key.clone(), artifacts);
        Ok(())
    }
}
