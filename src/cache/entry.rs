//! Cache Entry Types
//!
//! Defines key components and the stored entry record shared by both
//! storage tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// Key Components
// =============================================================================

/// Named parameters that identify a cached value within a namespace.
///
/// A `BTreeMap` keeps components sorted by name, which makes the canonical
/// key representation order-independent.
pub type KeyComponents = BTreeMap<String, Value>;

/// Build key components from (name, value) pairs
pub fn components<I, K, V>(pairs: I) -> KeyComponents
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached value with its expiration and access metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Full cache key (`namespace:digest`)
    pub key: String,
    /// The cached payload
    pub value: Value,
    /// Policy tier this entry was stored under
    pub tier: String,
    /// Time when the entry was created (Unix seconds)
    pub created_at: i64,
    /// Time when the entry expires (Unix seconds)
    pub expires_at: i64,
    /// Time of the most recent access (Unix seconds)
    pub last_accessed_at: i64,
    /// Number of times this entry has been read
    pub access_count: u64,
}

impl CacheEntry {
    /// Create a new entry expiring `ttl_seconds` after `now`
    pub fn new(
        key: impl Into<String>,
        value: Value,
        tier: impl Into<String>,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Self {
        let created_at = now.timestamp();
        Self {
            key: key.into(),
            value,
            tier: tier.into(),
            created_at,
            expires_at: created_at + ttl_seconds,
            last_accessed_at: created_at,
            access_count: 0,
        }
    }

    /// Check whether the entry is still servable at `now_ts`.
    ///
    /// An entry whose expiration equals the current instant is already
    /// expired.
    #[inline]
    pub fn is_live(&self, now_ts: i64) -> bool {
        now_ts < self.expires_at
    }

    /// Record a read of this entry
    pub fn record_access(&mut self, now_ts: i64) {
        self.last_accessed_at = now_ts;
        self.access_count += 1;
    }

    /// Remaining lifetime in seconds (zero once expired)
    pub fn remaining_seconds(&self, now_ts: i64) -> i64 {
        (self.expires_at - now_ts).max(0)
    }

    /// Namespace prefix of the key (everything before the first `:`)
    pub fn namespace(&self) -> &str {
        self.key.split(':').next().unwrap_or(&self.key)
    }
}
