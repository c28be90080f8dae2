//! Storage Backends
//!
//! The two stores behind the cache manager: a volatile LRU map and a
//! durable SQLite store. Both implement [`TierStore`] so administrative
//! operations (invalidation, clearing, expired-entry cleanup) can run
//! uniformly against whichever stores are enabled.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryLookup, MemoryTier};
pub use sqlite::SqliteTier;

use crate::cache::entry::CacheEntry;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Common operations over a cache store
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Look up a live entry. Expired entries are treated as absent; stores
    /// may reclaim them during the lookup.
    async fn get(&self, key: &str, tier: &str, now_ts: i64) -> Result<Option<Value>>;

    /// Insert or replace an entry
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Remove a single entry. Returns the number of entries removed (0 or 1).
    async fn remove(&self, key: &str) -> Result<u64>;

    /// Remove every entry whose key belongs to `namespace`.
    /// Returns the number of entries removed.
    async fn remove_namespace(&self, namespace: &str) -> Result<u64>;

    /// Bulk-remove entries whose expiration has passed.
    /// Returns the number of entries removed.
    async fn remove_expired(&self, now_ts: i64) -> Result<u64>;

    /// Remove all entries, or only those stored under `tier` when given.
    /// Returns the number of entries removed.
    async fn clear(&self, tier: Option<&str>) -> Result<u64>;

    /// Number of entries currently stored (live and expired-but-unreclaimed)
    async fn entry_count(&self) -> Result<u64>;
}
