//! Tiered Cache
//!
//! Two-tier cache for external API responses and derived calculations: a
//! bounded in-process LRU in front of a durable SQLite store. Values are
//! addressed by namespace plus key components and expire according to
//! named tier policies (short, medium, long by default).

pub mod clock;
pub mod entry;
pub mod key;
pub mod manager;
pub mod stats;
pub mod storage;
pub mod tier;
pub mod wrapper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{components, CacheEntry, KeyComponents};
pub use key::build_key;
pub use manager::{CacheConfig, CacheManager};
pub use stats::{CacheStats, CounterSnapshot, StatsCollector};
pub use storage::{MemoryTier, SqliteTier, TierStore};
pub use tier::{TierPolicy, TierRegistry};
pub use wrapper::{wrap, KeyExtractor, WrapConfig};
