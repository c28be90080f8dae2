//! Memory Tier (LRU)
//!
//! Bounded in-process store. An `IndexMap` behind one coarse mutex gives
//! recency ordering for free: insertion order is access order, maintained
//! by removing and reinserting an entry whenever it is touched. The front
//! of the map is always the least recently used entry.
//!
//! Expiration is lazy: an expired entry is reclaimed when a lookup finds
//! it, or during a bulk `remove_expired` sweep.

use crate::cache::entry::CacheEntry;
use crate::cache::key::in_namespace;
use crate::cache::storage::TierStore;
use crate::error::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

/// Default capacity in entries
pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;

/// Outcome of a memory lookup
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryLookup {
    /// Live entry found and promoted to most recently used
    Hit(Value),
    /// An entry existed but its TTL had elapsed; it was reclaimed
    Expired,
    /// No entry for this key
    Miss,
}

/// Volatile LRU store
#[derive(Debug)]
pub struct MemoryTier {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    capacity: usize,
}

impl MemoryTier {
    /// Create a store bounded to `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Configured capacity in entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Look up a key, refreshing its recency on a hit.
    ///
    /// An expired entry is removed here rather than waiting for the sweep;
    /// the caller reports it as a miss, not an eviction.
    pub fn lookup(&self, key: &str, now_ts: i64) -> MemoryLookup {
        let mut entries = self.entries.lock();

        let Some(mut entry) = entries.shift_remove(key) else {
            return MemoryLookup::Miss;
        };

        if !entry.is_live(now_ts) {
            return MemoryLookup::Expired;
        }

        entry.record_access(now_ts);
        let value = entry.value.clone();
        entries.insert(key.to_string(), entry);
        MemoryLookup::Hit(value)
    }

    /// Insert or replace an entry, evicting the least recently used entry
    /// when the store is full. Returns the evicted key, if any.
    pub fn insert(&self, entry: CacheEntry) -> Option<String> {
        let mut entries = self.entries.lock();

        // Replacing a key must not trigger an eviction
        entries.shift_remove(&entry.key);

        let evicted = if entries.len() >= self.capacity {
            entries.shift_remove_index(0).map(|(key, _)| key)
        } else {
            None
        };

        entries.insert(entry.key.clone(), entry);
        evicted
    }

    /// Snapshot an entry without touching its recency (test support)
    #[cfg(test)]
    pub(crate) fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl TierStore for MemoryTier {
    async fn get(&self, key: &str, _tier: &str, now_ts: i64) -> Result<Option<Value>> {
        Ok(match self.lookup(key, now_ts) {
            MemoryLookup::Hit(value) => Some(value),
            MemoryLookup::Expired | MemoryLookup::Miss => None,
        })
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.insert(entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<u64> {
        let removed = self.entries.lock().shift_remove(key).is_some();
        Ok(removed as u64)
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<u64> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !in_namespace(key, namespace));
        Ok((before - entries.len()) as u64)
    }

    async fn remove_expired(&self, now_ts: i64) -> Result<u64> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now_ts));
        Ok((before - entries.len()) as u64)
    }

    async fn clear(&self, tier: Option<&str>) -> Result<u64> {
        let mut entries = self.entries.lock();
        match tier {
            None => {
                let removed = entries.len() as u64;
                entries.clear();
                Ok(removed)
            }
            Some(tier) => {
                let before = entries.len();
                entries.retain(|_, entry| entry.tier != tier);
                Ok((before - entries.len()) as u64)
            }
        }
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }
}
