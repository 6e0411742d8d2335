//! Two-tier cache manager.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::backend::{CacheStore, DiskStore};
use super::key::CacheKey;
use super::layer::{Cache, Memo, MemoCapacity, PersistentCache};
use crate::request::CompletionRequest;
use crate::types::response::CompletionResponse;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false the persistent tier is bypassed entirely.
    pub persistent_enabled: bool,
    pub memo: MemoCapacity,
    /// Root of the on-disk store used by [`TwoTierCache::from_config`].
    pub cache_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent_enabled: true,
            memo: MemoCapacity::Unbounded,
            cache_dir: std::env::temp_dir().join("vision-lm-cache"),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `VISION_LM_CACHE_DIR`, `VISION_LM_PERSISTENT_CACHE`
    /// (`0`/`false` disables) and `VISION_LM_MEMO_CAPACITY` (`0` disables,
    /// a positive number bounds, `unbounded`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("VISION_LM_CACHE_DIR") {
            if !dir.trim().is_empty() {
                cfg.cache_dir = PathBuf::from(dir);
            }
        }
        if let Ok(v) = std::env::var("VISION_LM_PERSISTENT_CACHE") {
            cfg.persistent_enabled = !matches!(v.trim(), "0" | "false" | "off");
        }
        if let Ok(v) = std::env::var("VISION_LM_MEMO_CAPACITY") {
            match v.trim() {
                "unbounded" | "" => cfg.memo = MemoCapacity::Unbounded,
                s => {
                    if let Ok(n) = s.parse::<usize>() {
                        cfg.memo = NonZeroUsize::new(n)
                            .map(MemoCapacity::Bounded)
                            .unwrap_or(MemoCapacity::Disabled);
                    }
                }
            }
        }
        cfg
    }

    pub fn with_persistent(mut self, enabled: bool) -> Self {
        self.persistent_enabled = enabled;
        self
    }

    pub fn with_memo(mut self, memo: MemoCapacity) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memo_hits: u64,
    pub persistent_hits: u64,
    pub misses: u64,
    pub writes: u64,
    /// Persistent store reads or writes that failed and were skipped.
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.memo_hits + self.persistent_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    memo_hits: AtomicU64,
    persistent_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
            persistent_hits: self.persistent_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Memo over persistent store over the network call.
///
/// Best-effort: concurrent misses on the same key each run `compute`.
pub struct TwoTierCache {
    memo: Option<Memo>,
    persistent: Option<PersistentCache>,
    stats: AtomicStats,
}

impl TwoTierCache {
    /// `store` is ignored when `config.persistent_enabled` is false.
    pub fn new(config: &CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let persistent = config
            .persistent_enabled
            .then(|| PersistentCache::new(store));
        debug!(
            persistent = persistent.as_ref().map(|p| p.store_name()),
            memo = ?config.memo,
            "two-tier cache initialized"
        );
        Self {
            memo: Memo::with_capacity(config.memo),
            persistent,
            stats: AtomicStats::default(),
        }
    }

    /// Disk-backed cache rooted at `config.cache_dir`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config, Arc::new(DiskStore::new(config.cache_dir.clone())))
    }

    /// Both tiers off: every call reaches `compute`.
    pub fn disabled() -> Self {
        Self {
            memo: None,
            persistent: None,
            stats: AtomicStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn memo_len(&self) -> usize {
        self.memo.as_ref().map(Memo::len).unwrap_or(0)
    }

    pub async fn get_or_compute<F, Fut>(
        &self,
        request: &CompletionRequest,
        compute: F,
    ) -> Result<CompletionResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompletionResponse>>,
    {
        let key = CacheKey::for_request(request);

        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.get(&key).await? {
                self.stats.memo_hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "memo hit");
                return Ok(hit);
            }
        }

        let response = self.persistent_get_or_compute(&key, compute).await?;

        if let Some(memo) = &self.memo {
            memo.put(&key, response.clone()).await?;
        }
        Ok(response)
    }

    /// Miss handler of the memo tier.
    async fn persistent_get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<CompletionResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompletionResponse>>,
    {
        let Some(persistent) = &self.persistent else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return compute().await;
        };

        // Store failures degrade to a miss; the cache never blocks a call.
        match persistent.get(key).await {
            Ok(Some(hit)) => {
                self.stats.persistent_hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "persistent hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, store = persistent.store_name(), error = %e, "persistent cache read failed, treating as miss");
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "cache miss, calling remote API");
        let response = compute().await?;
        match persistent.put(key, response.clone()).await {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, store = persistent.store_name(), error = %e, "persistent cache write failed, response not stored");
            }
        }
        Ok(response)
    }
}
