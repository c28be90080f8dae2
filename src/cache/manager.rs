//! Cache Manager
//!
//! The façade callers interact with. Coordinates the memory and persistent
//! stores behind one API: memory-first lookups with promotion on a
//! persistent hit, write-through on set, prefix invalidation, and the
//! merged statistics snapshot.
//!
//! Degradation policy: a persistent-store failure on the read path is
//! logged and treated as a miss so callers keep working from the memory
//! tier. Failures on the write and administrative paths surface, since the
//! caller must know a mutation may not have taken effect.

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::entry::{CacheEntry, KeyComponents};
use crate::cache::key::{build_key, validate_namespace};
use crate::cache::stats::{CacheStats, MemoryStats, PersistentStats, StatsCollector};
use crate::cache::storage::memory::DEFAULT_MEMORY_CAPACITY;
use crate::cache::storage::{MemoryLookup, MemoryTier, SqliteTier, TierStore};
use crate::cache::tier::TierRegistry;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Cache manager configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// SQLite database path; `None` uses a private in-memory database
    pub db_path: Option<PathBuf>,
    /// Memory tier capacity in entries
    pub memory_capacity: usize,
    /// Enable the volatile memory tier
    pub enable_memory: bool,
    /// Enable the durable persistent tier
    pub enable_persistent: bool,
    /// Tier policies
    pub tiers: TierRegistry,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from("cache.db")),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            enable_memory: true,
            enable_persistent: true,
            tiers: TierRegistry::default(),
        }
    }
}

// =============================================================================
// Cache Manager
// =============================================================================

/// Two-tier cache façade
pub struct CacheManager {
    memory: Option<MemoryTier>,
    persistent: Option<SqliteTier>,
    tiers: TierRegistry,
    stats: StatsCollector,
    clock: Arc<dyn Clock>,
    memory_capacity: usize,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("memory_enabled", &self.memory.is_some())
            .field("persistent_enabled", &self.persistent.is_some())
            .field("tiers", &self.tiers.len())
            .finish()
    }
}

impl CacheManager {
    /// Create a manager from configuration, using the system clock
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an injected clock (TTL tests)
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if !config.enable_memory && !config.enable_persistent {
            return Err(Error::Configuration(
                "at least one cache store must be enabled".to_string(),
            ));
        }

        let memory = config
            .enable_memory
            .then(|| MemoryTier::new(config.memory_capacity));

        let persistent = if config.enable_persistent {
            let store = match &config.db_path {
                Some(path) => SqliteTier::open(path)?,
                None => SqliteTier::in_memory()?,
            };
            Some(store)
        } else {
            None
        };

        info!(
            memory = memory.is_some(),
            persistent = persistent.is_some(),
            tiers = config.tiers.len(),
            "cache manager initialized"
        );

        Ok(Self {
            memory,
            persistent,
            tiers: config.tiers,
            stats: StatsCollector::new(),
            clock,
            memory_capacity: config.memory_capacity,
        })
    }

    /// Tier registry in use
    pub fn registry(&self) -> &TierRegistry {
        &self.tiers
    }

    /// Persistent store handle, if enabled
    pub fn persistent(&self) -> Option<&SqliteTier> {
        self.persistent.as_ref()
    }

    /// Enabled stores, memory first
    fn stores(&self) -> Vec<&dyn TierStore> {
        let mut stores: Vec<&dyn TierStore> = Vec::with_capacity(2);
        if let Some(memory) = &self.memory {
            stores.push(memory);
        }
        if let Some(persistent) = &self.persistent {
            stores.push(persistent);
        }
        stores
    }

    // =========================================================================
    // Lookup / Store
    // =========================================================================

    /// Look up a cached value.
    ///
    /// Checks memory first; on a persistent hit the entry is promoted into
    /// the memory tier with its original expiry. Persistent failures
    /// degrade to a miss.
    pub async fn get(
        &self,
        namespace: &str,
        components: &KeyComponents,
        tier: &str,
    ) -> Result<Option<Value>> {
        self.tiers.resolve(tier)?;
        let key = build_key(namespace, components)?;
        let now_ts = self.clock.now_ts();

        if let Some(memory) = &self.memory {
            match memory.lookup(&key, now_ts) {
                MemoryLookup::Hit(value) => {
                    self.stats.memory().record_hit();
                    debug!(%key, tier, store = "memory", "cache hit");
                    return Ok(Some(value));
                }
                MemoryLookup::Expired | MemoryLookup::Miss => {
                    self.stats.memory().record_miss();
                }
            }
        }

        if let Some(persistent) = &self.persistent {
            match persistent.fetch(&key, tier, now_ts).await {
                Ok(Some(entry)) => {
                    debug!(%key, tier, store = "persistent", "cache hit");
                    let value = entry.value.clone();
                    self.promote(entry);
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%key, tier, error = %e, "persistent read failed, degrading to miss");
                }
            }
        }

        debug!(%key, tier, "cache miss");
        Ok(None)
    }

    /// Copy a persistent hit into the memory tier, keeping its expiry
    fn promote(&self, entry: CacheEntry) {
        let Some(memory) = &self.memory else {
            return;
        };
        let key = entry.key.clone();
        let evicted = memory.insert(entry);
        self.stats.memory().record_insert();
        if let Some(evicted) = evicted {
            self.stats.memory().record_evictions(1);
            debug!(promoted = %key, %evicted, "promotion evicted LRU entry");
        }
    }

    /// Store a value under the given tier's TTL, writing through to every
    /// enabled store. A persistent write failure surfaces.
    pub async fn set(
        &self,
        namespace: &str,
        components: &KeyComponents,
        value: Value,
        tier: &str,
    ) -> Result<String> {
        let policy = self.tiers.resolve(tier)?;
        let key = build_key(namespace, components)?;
        let entry = CacheEntry::new(&key, value, tier, self.clock.now(), policy.ttl_seconds);

        if let Some(memory) = &self.memory {
            let evicted = memory.insert(entry.clone());
            self.stats.memory().record_insert();
            if let Some(evicted) = evicted {
                self.stats.memory().record_evictions(1);
                debug!(inserted = %key, %evicted, "capacity eviction");
            }
        }

        if let Some(persistent) = &self.persistent {
            persistent.put(entry).await?;
        }

        debug!(%key, tier, "cache set");
        Ok(key)
    }

    /// Fetch a typed value, computing and caching it on a miss.
    ///
    /// Errors from `compute` are returned and never cached. A failure to
    /// store the computed value is logged and swallowed so the caller
    /// still gets their result.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        namespace: &str,
        components: &KeyComponents,
        tier: &str,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(namespace, components, tier).await? {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(namespace, tier, error = %e, "cached value failed to deserialize, recomputing");
                }
            }
        }

        let computed = compute().await?;
        let value = serde_json::to_value(&computed)?;
        if let Err(e) = self.set(namespace, components, value, tier).await {
            warn!(namespace, tier, error = %e, "failed to store computed value");
        }
        Ok(computed)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Remove one entry (with `components`) or a whole namespace (without).
    /// Returns the number of distinct entries removed.
    pub async fn invalidate(
        &self,
        namespace: &str,
        components: Option<&KeyComponents>,
    ) -> Result<u64> {
        validate_namespace(namespace)?;

        let mut removed = 0u64;
        match components {
            Some(components) => {
                let key = build_key(namespace, components)?;
                for store in self.stores() {
                    removed = removed.max(store.remove(&key).await?);
                }
            }
            None => {
                for store in self.stores() {
                    removed = removed.max(store.remove_namespace(namespace).await?);
                }
            }
        }

        info!(namespace, removed, targeted = components.is_some(), "cache invalidated");
        Ok(removed)
    }

    /// Remove every entry, or only entries under `tier`. Counters are not
    /// reset. Returns the number of distinct entries removed.
    pub async fn clear(&self, tier: Option<&str>) -> Result<u64> {
        if let Some(tier) = tier {
            self.tiers.resolve(tier)?;
        }

        let mut removed = 0u64;
        for store in self.stores() {
            removed = removed.max(store.clear(tier).await?);
        }

        info!(tier = tier.unwrap_or("all"), removed, "cache cleared");
        Ok(removed)
    }

    /// Sweep expired entries from every store. Removals count as
    /// evictions. Returns the number of distinct entries removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let now_ts = self.clock.now_ts();
        let mut removed = 0u64;

        if let Some(memory) = &self.memory {
            let swept = memory.remove_expired(now_ts).await?;
            self.stats.memory().record_evictions(swept);
            removed = removed.max(swept);
        }

        if let Some(persistent) = &self.persistent {
            removed = removed.max(persistent.remove_expired(now_ts).await?);
        }

        info!(removed, "expired entries cleaned up");
        Ok(removed)
    }

    /// Merged statistics snapshot: process-local counters for the memory
    /// tier, durable counters for the persistent tiers.
    pub async fn stats(&self) -> Result<CacheStats> {
        let memory = match &self.memory {
            Some(store) => {
                let counters = self.stats.memory().snapshot();
                MemoryStats {
                    enabled: true,
                    entry_count: store.len() as u64,
                    max_entries: self.memory_capacity as u64,
                    counters,
                    hit_ratio: counters.hit_ratio(),
                }
            }
            None => MemoryStats {
                enabled: false,
                entry_count: 0,
                max_entries: 0,
                counters: Default::default(),
                hit_ratio: 0.0,
            },
        };

        let persistent = match &self.persistent {
            Some(store) => store.stats(&self.tiers, self.clock.now_ts()).await?,
            None => PersistentStats::disabled(),
        };

        Ok(CacheStats::assemble(memory, persistent))
    }
}
