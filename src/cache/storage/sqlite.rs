//! Persistent Tier (SQLite)
//!
//! Durable store backing the memory tier. One connection behind a mutex,
//! WAL journaling, and `synchronous=FULL` so an acknowledged write is on
//! disk. Every operation runs in a single transaction; per-tier counters
//! in the `cache_stats` table are updated inside the same transaction as
//! the entry mutation they describe, so counters and entries can never
//! disagree after a crash.
//!
//! All calls are dispatched through `spawn_blocking` to keep rusqlite off
//! the async runtime threads.

use crate::cache::entry::CacheEntry;
use crate::cache::stats::{CounterSnapshot, PersistentStats, PersistentTierStats};
use crate::cache::storage::TierStore;
use crate::cache::tier::TierRegistry;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SCHEMA: &str = "
PRAGMA synchronous = FULL;

CREATE TABLE IF NOT EXISTS cache (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    tier TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_cache_tier ON cache(tier);

CREATE TABLE IF NOT EXISTS cache_stats (
    tier TEXT PRIMARY KEY,
    hits INTEGER NOT NULL DEFAULT 0,
    misses INTEGER NOT NULL DEFAULT 0,
    inserts INTEGER NOT NULL DEFAULT 0,
    evictions INTEGER NOT NULL DEFAULT 0
);
";

/// Counter column in `cache_stats`
#[derive(Debug, Clone, Copy)]
enum StatColumn {
    Hits,
    Misses,
    Inserts,
    Evictions,
}

impl StatColumn {
    fn as_str(self) -> &'static str {
        match self {
            StatColumn::Hits => "hits",
            StatColumn::Misses => "misses",
            StatColumn::Inserts => "inserts",
            StatColumn::Evictions => "evictions",
        }
    }
}

/// Bump one counter for a tier, creating the row on first use
fn bump_stat(tx: &Transaction<'_>, tier: &str, column: StatColumn, n: u64) -> rusqlite::Result<()> {
    let col = column.as_str();
    tx.execute(
        &format!(
            "INSERT INTO cache_stats (tier, {col}) VALUES (?1, ?2) \
             ON CONFLICT(tier) DO UPDATE SET {col} = {col} + ?2"
        ),
        params![tier, n as i64],
    )?;
    Ok(())
}

/// Escape LIKE metacharacters so a namespace is matched literally
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Durable SQLite-backed store
#[derive(Debug)]
pub struct SqliteTier {
    conn: Arc<Mutex<Connection>>,
    available: AtomicBool,
}

impl SqliteTier {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests, ephemeral deployments)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // journal_mode returns a row, so it cannot ride in execute_batch
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            available: AtomicBool::new(true),
        })
    }

    /// Mark the store reachable or unreachable (test support for
    /// degradation paths)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Run a closure against the connection on the blocking pool
    async fn exec<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_available() {
            return Err(Error::store_unavailable(operation, "store is unavailable"));
        }

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::store_unavailable(operation, e))?
        .map_err(Error::from)
    }

    /// Transactional lookup returning the full entry so callers can
    /// promote it into the memory tier with its original expiry intact.
    ///
    /// A hit bumps the entry's access metadata and the stored tier's hit
    /// counter; a miss (absent or expired) bumps the caller's tier miss
    /// counter. Expired rows are left for the sweep.
    pub async fn fetch(&self, key: &str, tier: &str, now_ts: i64) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        let tier = tier.to_string();

        let row = self
            .exec("get", move |conn| {
                let tx = conn.transaction()?;
                let row: Option<(String, String, i64, i64, i64, i64)> = tx
                    .query_row(
                        "SELECT value, tier, expires_at, created_at, \
                         access_count, last_accessed_at \
                         FROM cache WHERE key = ?1 AND expires_at > ?2",
                        params![key, now_ts],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                            ))
                        },
                    )
                    .optional()?;

                let row = match row {
                    Some((value, stored_tier, expires_at, created_at, access_count, _)) => {
                        tx.execute(
                            "UPDATE cache SET access_count = access_count + 1, \
                             last_accessed_at = ?2 WHERE key = ?1",
                            params![key, now_ts],
                        )?;
                        bump_stat(&tx, &stored_tier, StatColumn::Hits, 1)?;
                        Some((key, value, stored_tier, expires_at, created_at, access_count))
                    }
                    None => {
                        bump_stat(&tx, &tier, StatColumn::Misses, 1)?;
                        None
                    }
                };
                tx.commit()?;
                Ok(row)
            })
            .await?;

        match row {
            Some((key, value, tier, expires_at, created_at, access_count)) => {
                Ok(Some(CacheEntry {
                    key,
                    value: serde_json::from_str(&value)?,
                    tier,
                    created_at,
                    expires_at,
                    last_accessed_at: now_ts,
                    access_count: access_count as u64 + 1,
                }))
            }
            None => Ok(None),
        }
    }

    /// Per-tier statistics: durable counters plus live entry counts and
    /// serialized sizes, one row per registered tier.
    pub async fn stats(&self, registry: &TierRegistry, now_ts: i64) -> Result<PersistentStats> {
        let policies: Vec<_> = registry.policies().cloned().collect();

        let tiers = self
            .exec("stats", move |conn| {
                let tx = conn.transaction()?;
                let mut out = Vec::with_capacity(policies.len());
                for policy in policies {
                    let counters: CounterSnapshot = tx
                        .query_row(
                            "SELECT hits, misses, inserts, evictions \
                             FROM cache_stats WHERE tier = ?1",
                            params![policy.name],
                            |row| {
                                Ok(CounterSnapshot {
                                    hits: row.get::<_, i64>(0)? as u64,
                                    misses: row.get::<_, i64>(1)? as u64,
                                    inserts: row.get::<_, i64>(2)? as u64,
                                    evictions: row.get::<_, i64>(3)? as u64,
                                })
                            },
                        )
                        .optional()?
                        .unwrap_or_default();

                    let (entry_count, size_bytes): (i64, i64) = tx.query_row(
                        "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0) \
                         FROM cache WHERE tier = ?1 AND expires_at > ?2",
                        params![policy.name, now_ts],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )?;

                    out.push(PersistentTierStats {
                        tier: policy.name,
                        entry_count: entry_count as u64,
                        size_bytes: size_bytes as u64,
                        counters,
                        hit_ratio: counters.hit_ratio(),
                        ttl_seconds: policy.ttl_seconds,
                        description: policy.description,
                    });
                }
                tx.commit()?;
                Ok(out)
            })
            .await?;

        Ok(PersistentStats {
            enabled: true,
            tiers,
        })
    }
}

#[async_trait]
impl TierStore for SqliteTier {
    async fn get(&self, key: &str, tier: &str, now_ts: i64) -> Result<Option<Value>> {
        Ok(self.fetch(key, tier, now_ts).await?.map(|entry| entry.value))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        let value = serde_json::to_string(&entry.value)?;

        self.exec("put", move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR REPLACE INTO cache \
                 (key, value, tier, expires_at, created_at, access_count, last_accessed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.key,
                    value,
                    entry.tier,
                    entry.expires_at,
                    entry.created_at,
                    entry.access_count as i64,
                    entry.last_accessed_at,
                ],
            )?;
            bump_stat(&tx, &entry.tier, StatColumn::Inserts, 1)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<u64> {
        let key = key.to_string();
        self.exec("remove", move |conn| {
            let removed = conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
            Ok(removed as u64)
        })
        .await
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<u64> {
        let pattern = format!("{}:%", escape_like(namespace));
        self.exec("invalidate", move |conn| {
            let removed = conn.execute(
                "DELETE FROM cache WHERE key LIKE ?1 ESCAPE '\\'",
                params![pattern],
            )?;
            Ok(removed as u64)
        })
        .await
    }

    /// Bulk-delete expired rows via the expiration index, counting the
    /// removals as evictions on each tier's durable counters.
    async fn remove_expired(&self, now_ts: i64) -> Result<u64> {
        self.exec("cleanup", move |conn| {
            let tx = conn.transaction()?;

            let per_tier: Vec<(String, i64)> = {
                let mut stmt = tx.prepare(
                    "SELECT tier, COUNT(*) FROM cache \
                     WHERE expires_at <= ?1 GROUP BY tier",
                )?;
                let rows = stmt.query_map(params![now_ts], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut total = 0u64;
            for (tier, count) in &per_tier {
                bump_stat(&tx, tier, StatColumn::Evictions, *count as u64)?;
                total += *count as u64;
            }

            tx.execute("DELETE FROM cache WHERE expires_at <= ?1", params![now_ts])?;
            tx.commit()?;
            Ok(total)
        })
        .await
    }

    async fn clear(&self, tier: Option<&str>) -> Result<u64> {
        let tier = tier.map(str::to_string);
        self.exec("clear", move |conn| {
            let removed = match tier {
                None => conn.execute("DELETE FROM cache", [])?,
                Some(tier) => {
                    conn.execute("DELETE FROM cache WHERE tier = ?1", params![tier])?
                }
            };
            Ok(removed as u64)
        })
        .await
    }

    async fn entry_count(&self) -> Result<u64> {
        self.exec("count", |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(key: &str, tier: &str, ttl: i64) -> CacheEntry {
        CacheEntry::new(key, json!({"k": key}), tier, Utc::now(), ttl)
    }

    fn now_ts() -> i64 {
        Utc::now().timestamp()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();

        let value = store.get("api:a", "short", now_ts()).await.unwrap();
        assert_eq!(value, Some(json!({"k": "api:a"})));

        let missing = store.get("api:b", "short", now_ts()).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_expired_entry_not_served() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();

        let value = store.get("api:a", "short", now_ts() + 120).await.unwrap();
        assert_eq!(value, None);
        // Expired rows stay until the sweep
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_expired_counts_evictions() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();
        store.put(entry("api:b", "short", 60)).await.unwrap();
        store.put(entry("api:c", "long", 3600)).await.unwrap();

        let removed = store.remove_expired(now_ts() + 120).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.entry_count().await.unwrap(), 1);

        let stats = store.stats(&TierRegistry::default(), now_ts()).await.unwrap();
        let short = stats.tiers.iter().find(|t| t.tier == "short").unwrap();
        assert_eq!(short.counters.evictions, 2);
    }

    #[tokio::test]
    async fn test_namespace_removal_is_exact() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();
        store.put(entry("apiv2:b", "short", 60)).await.unwrap();

        let removed = store.remove_namespace("api").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .get("apiv2:b", "short", now_ts())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_stats_counters_and_sizes() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();

        store.get("api:a", "short", now_ts()).await.unwrap();
        store.get("api:a", "short", now_ts()).await.unwrap();
        store.get("api:x", "short", now_ts()).await.unwrap();

        let stats = store.stats(&TierRegistry::default(), now_ts()).await.unwrap();
        let short = stats.tiers.iter().find(|t| t.tier == "short").unwrap();
        assert_eq!(short.counters.hits, 2);
        assert_eq!(short.counters.misses, 1);
        assert_eq!(short.counters.inserts, 1);
        assert_eq!(short.entry_count, 1);
        assert!(short.size_bytes > 0);
        assert!((short.hit_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_counters_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = SqliteTier::open(&path).unwrap();
            store.put(entry("api:a", "medium", 600)).await.unwrap();
            store.get("api:a", "medium", now_ts()).await.unwrap();
        }

        let store = SqliteTier::open(&path).unwrap();
        let value = store.get("api:a", "medium", now_ts()).await.unwrap();
        assert_eq!(value, Some(json!({"k": "api:a"})));

        let stats = store.stats(&TierRegistry::default(), now_ts()).await.unwrap();
        let medium = stats.tiers.iter().find(|t| t.tier == "medium").unwrap();
        assert_eq!(medium.counters.hits, 2);
        assert_eq!(medium.counters.inserts, 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_counters() {
        let store = SqliteTier::in_memory().unwrap();
        store.put(entry("api:a", "short", 60)).await.unwrap();
        store.put(entry("api:b", "long", 60)).await.unwrap();

        assert_eq!(store.clear(Some("short")).await.unwrap(), 1);
        assert_eq!(store.clear(None).await.unwrap(), 1);

        let stats = store.stats(&TierRegistry::default(), now_ts()).await.unwrap();
        let short = stats.tiers.iter().find(|t| t.tier == "short").unwrap();
        assert_eq!(short.counters.inserts, 1);
        assert_eq!(short.entry_count, 0);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = SqliteTier::in_memory().unwrap();
        store.set_available(false);

        let err = store.get("api:a", "short", now_ts()).await.unwrap_err();
        assert_matches!(err, Error::StoreUnavailable { .. });

        store.set_available(true);
        assert!(store.get("api:a", "short", now_ts()).await.is_ok());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("pct%und_"), "pct\\%und\\_");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
