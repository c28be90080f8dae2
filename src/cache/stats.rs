//! Cache Statistics
//!
//! Cache-line aligned counters for the hot paths, plus the serializable
//! snapshot types returned by `CacheManager::stats` and the admin API.
//! Counters are monotonically increasing for the lifetime of the process;
//! the persistent store additionally keeps durable per-tier counters in its
//! `cache_stats` table so history survives restarts.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// Tier Counters (Cache-Line Aligned)
// =============================================================================

/// The four per-tier counters, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug)]
pub struct TierCounters {
    /// Lookups served by this tier
    pub hits: AtomicU64,
    /// Lookups this tier could not serve (absent or expired)
    pub misses: AtomicU64,
    /// Entries written to this tier
    pub inserts: AtomicU64,
    /// Entries removed to make room or reclaim expired space
    pub evictions: AtomicU64,
    /// Padding to fill the cache line
    _padding: [u8; 32],
}

// Verify size at compile time
const _: () = assert!(std::mem::size_of::<TierCounters>() == CACHE_LINE_SIZE);

impl Default for TierCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl TierCounters {
    /// Create new zeroed counters
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            _padding: [0; 32],
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    /// Create a point-in-time snapshot of the counter group
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Counter Snapshot
// =============================================================================

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

impl CounterSnapshot {
    /// Total lookups against this tier
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit ratio in [0.0, 1.0]; zero-request tiers report 0.0
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Counter-wise sum of two snapshots
    pub fn merged(&self, other: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            inserts: self.inserts + other.inserts,
            evictions: self.evictions + other.evictions,
        }
    }
}

// =============================================================================
// Stats Collector
// =============================================================================

/// Process-local counters for the memory store.
///
/// Persistent-tier counters are not held here; they live in the store's
/// `cache_stats` table and ride in the same transaction as the entry
/// mutation they describe.
#[derive(Debug, Default)]
pub struct StatsCollector {
    memory: TierCounters,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for the memory store
    pub fn memory(&self) -> &TierCounters {
        &self.memory
    }
}

// =============================================================================
// Snapshot Types
// =============================================================================

/// Memory store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub enabled: bool,
    /// Live entries currently held
    pub entry_count: u64,
    /// Configured capacity in entries
    pub max_entries: u64,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    pub hit_ratio: f64,
}

/// Per-policy-tier statistics from the persistent store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentTierStats {
    pub tier: String,
    /// Live entries stored under this tier
    pub entry_count: u64,
    /// Total serialized payload size in bytes
    pub size_bytes: u64,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    pub hit_ratio: f64,
    pub ttl_seconds: i64,
    pub description: String,
}

/// Persistent store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentStats {
    pub enabled: bool,
    pub tiers: Vec<PersistentTierStats>,
}

impl PersistentStats {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tiers: Vec::new(),
        }
    }

    /// Counter sums across all tiers
    pub fn totals(&self) -> CounterSnapshot {
        self.tiers
            .iter()
            .fold(CounterSnapshot::default(), |acc, t| acc.merged(&t.counters))
    }
}

/// Full statistics snapshot across both stores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory: MemoryStats,
    pub persistent: PersistentStats,
    /// Counter sums across both stores
    pub totals: CounterSnapshot,
    pub overall_hit_ratio: f64,
}

impl CacheStats {
    /// Assemble the full snapshot from per-store figures
    pub fn assemble(memory: MemoryStats, persistent: PersistentStats) -> Self {
        let totals = memory.counters.merged(&persistent.totals());
        let overall_hit_ratio = totals.hit_ratio();
        Self {
            memory,
            persistent,
            totals,
            overall_hit_ratio,
        }
    }
}
