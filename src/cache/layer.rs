//! The two cache tiers behind one interface.

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

use super::backend::CacheStore;
use super::key::CacheKey;
use crate::types::response::CompletionResponse;
use crate::Result;

/// A keyed lookup tier. Tiers compose by delegation: the owner of an outer
/// tier calls into the inner one on a miss.
#[async_trait]
pub trait Cache<K: Sync, V: Send>: Send + Sync {
    async fn get(&self, key: &K) -> Result<Option<V>>;
    async fn put(&self, key: &K, value: V) -> Result<()>;
}

/// In-process memo size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "capacity")]
pub enum MemoCapacity {
    #[default]
    Unbounded,
    /// Least-recently-used eviction past this many entries.
    Bounded(NonZeroUsize),
    /// No in-process tier at all.
    Disabled,
}

/// Process-local tier holding already-deserialized responses.
pub struct Memo {
    entries: Mutex<LruCache<String, CompletionResponse>>,
}

impl Memo {
    /// `None` for [`MemoCapacity::Disabled`].
    pub fn with_capacity(capacity: MemoCapacity) -> Option<Self> {
        let lru = match capacity {
            MemoCapacity::Unbounded => LruCache::unbounded(),
            MemoCapacity::Bounded(n) => LruCache::new(n),
            MemoCapacity::Disabled => return None,
        };
        Some(Self {
            entries: Mutex::new(lru),
        })
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache<CacheKey, CompletionResponse> for Memo {
    async fn get(&self, key: &CacheKey) -> Result<Option<CompletionResponse>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&key.canonical).cloned())
    }

    async fn put(&self, key: &CacheKey, value: CompletionResponse) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key.canonical.clone(), value);
        Ok(())
    }
}

/// What a persistent entry looks like on disk.
#[derive(Debug, Serialize, Deserialize)]
struct CachedEntry {
    key: String,
    response: CompletionResponse,
}

/// Durable tier: serializes responses into a [`CacheStore`].
#[derive(Clone)]
pub struct PersistentCache {
    store: Arc<dyn CacheStore>,
}

impl PersistentCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

#[async_trait]
impl Cache<CacheKey, CompletionResponse> for PersistentCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CompletionResponse>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CachedEntry>(&bytes) {
            Ok(entry) if entry.key == key.canonical => Ok(Some(entry.response)),
            Ok(_) => {
                warn!(key = %key, store = self.store.name(), "cache entry key mismatch, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, store = self.store.name(), error = %e, "corrupt cache entry, ignoring");
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, value: CompletionResponse) -> Result<()> {
        let entry = CachedEntry {
            key: key.canonical.clone(),
            response: value,
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.store.put(key, &bytes).await
    }
}
