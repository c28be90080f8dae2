//! # tiercache
//!
//! Tiered caching subsystem for external API responses and derived
//! calculations.
//!
//! ## Features
//!
//! - **Two-tier storage**: bounded in-process LRU in front of a durable
//!   SQLite store, with promotion on persistent hits and write-through on
//!   stores
//! - **Named TTL tiers**: short (1 hour), medium (1 day), long (30 days)
//!   by default, extensible at construction
//! - **Deterministic keys**: `namespace:digest` keys built from named
//!   components, enabling prefix invalidation per namespace
//! - **Statistics**: per-tier hit/miss/insert/eviction counters, durable
//!   across restarts for the persistent tiers
//! - **Function wrapping**: cache any async fallible function with
//!   [`cache::wrap`] or [`cache::CacheManager::get_or_compute`]
//! - **Admin API**: axum router exposing stats, clear, invalidate, and
//!   cleanup endpoints
//!
//! ## Example
//!
//! ```no_run
//! use tiercache::cache::{components, CacheConfig, CacheManager};
//! use serde_json::json;
//!
//! # async fn example() -> tiercache::Result<()> {
//! let cache = CacheManager::new(CacheConfig::default())?;
//!
//! let ghi: f64 = cache
//!     .get_or_compute(
//!         "solar_resource",
//!         &components([("lat", json!(39.7392)), ("lon", json!(-104.9903))]),
//!         "long",
//!         || async { Ok(4.83) },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod cache;
pub mod error;

pub use cache::{CacheConfig, CacheManager};
pub use error::{Error, Result};
