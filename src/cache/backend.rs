//! Persistent store implementations.
//!
//! Stores hold opaque bytes addressed by [`CacheKey`]. They never evict and
//! never expire; writes are idempotent (the same key always maps to the same
//! response), so concurrent writers may race harmlessly.

use super::key::CacheKey;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Process-local store, mostly for tests and notebooks.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key.hash).cloned())
    }

    async fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.hash.clone(), value.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Content-addressed directory of JSON files, durable across restarts.
///
/// Layout: `<root>/<hash[0..2]>/<hash>.json`. Writes go to a unique temp file
/// in the same directory and are renamed into place, so readers never observe
/// a partial entry and several processes can share one root.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let shard = key.hash.get(..2).unwrap_or("00");
        self.root.join(shard).join(format!("{}.json", key.hash))
    }

    fn io_error(&self, op: &str, path: &Path, err: std::io::Error) -> Error {
        Error::cache_with_context(
            format!("disk store {} failed: {}", op, err),
            ErrorContext::new()
                .with_details(path.display().to_string())
                .with_source("disk_store"),
        )
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", &path, e)),
        }
    }

    async fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| self.io_error("create_dir", &dir, e))?;

        let tmp = dir.join(format!("{}.{}.tmp", key.hash, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| self.io_error("write", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error("rename", &path, e));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}
