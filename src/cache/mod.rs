//! # Response Caching Module
//!
//! Memoizes remote completion calls keyed by the full canonical request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TwoTierCache`] | In-process memo layered over a persistent store |
//! | [`CacheConfig`] | Tier switches and memo capacity |
//! | [`Cache`] | Interface shared by both tiers |
//! | [`CacheStore`] | Byte store behind the persistent tier |
//! | [`DiskStore`] | Content-addressed files, durable across restarts |
//! | [`MemoryStore`] | Process-local byte store |
//! | [`CacheKey`] | Canonical request string plus SHA-256 digest |
//!
//! Lookup order: memo, then persistent store, then the network. A persistent
//! hit refills the memo; a network result is written to both. Failed calls
//! are never cached. There is no invalidation and no single-flight: two
//! concurrent misses on one key both reach the network.
//!
//! ```rust
//! use std::sync::Arc;
//! use vision_lm::cache::{CacheConfig, MemoCapacity, MemoryStore, TwoTierCache};
//!
//! let config = CacheConfig::new().with_memo(MemoCapacity::Unbounded);
//! let cache = TwoTierCache::new(&config, Arc::new(MemoryStore::new()));
//! assert_eq!(cache.stats().misses, 0);
//! ```

mod backend;
mod key;
mod layer;
mod manager;

pub use backend::{CacheStore, DiskStore, MemoryStore};
pub use key::CacheKey;
pub use layer::{Cache, Memo, MemoCapacity, PersistentCache};
pub use manager::{CacheConfig, CacheStats, TwoTierCache};
