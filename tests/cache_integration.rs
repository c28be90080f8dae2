//! End-to-end cache scenarios exercising both storage tiers together.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;
use tiercache::cache::{
    components, wrap, CacheConfig, CacheManager, ManualClock, WrapConfig,
};

fn ephemeral() -> CacheConfig {
    CacheConfig {
        db_path: None,
        ..Default::default()
    }
}

#[tokio::test]
async fn round_trip_through_both_tiers() {
    let cache = CacheManager::new(ephemeral()).unwrap();
    let c = components([("station", json!("denver")), ("units", json!("metric"))]);

    cache
        .set("weather", &c, json!({"temp": 21.5, "wind": 12}), "short")
        .await
        .unwrap();

    let value = cache.get("weather", &c, "short").await.unwrap();
    assert_eq!(value, Some(json!({"temp": 21.5, "wind": 12})));
}

#[tokio::test]
async fn keys_are_deterministic_across_component_order() {
    let cache = CacheManager::new(ephemeral()).unwrap();

    let forward = components([("lat", json!(39.7392)), ("lon", json!(-104.9903))]);
    let reversed = components([("lon", json!(-104.9903)), ("lat", json!(39.7392))]);

    cache
        .set("solar_resource", &forward, json!({"ghi": 4.83}), "long")
        .await
        .unwrap();

    let value = cache.get("solar_resource", &reversed, "long").await.unwrap();
    assert_eq!(value, Some(json!({"ghi": 4.83})));
}

#[tokio::test]
async fn entries_expire_per_tier_ttl() {
    let clock = Arc::new(ManualClock::starting_now());
    let cache = CacheManager::with_clock(ephemeral(), clock.clone()).unwrap();

    let short = components([("id", json!("s"))]);
    let long = components([("id", json!("l"))]);
    cache.set("api", &short, json!(1), "short").await.unwrap();
    cache.set("api", &long, json!(2), "long").await.unwrap();

    // Past the short TTL (1h) but well within the long TTL (30d)
    clock.advance(Duration::seconds(2 * 3600));
    assert_eq!(cache.get("api", &short, "short").await.unwrap(), None);
    assert_eq!(cache.get("api", &long, "long").await.unwrap(), Some(json!(2)));

    // A fresh set is servable again
    cache.set("api", &short, json!(3), "short").await.unwrap();
    assert_eq!(cache.get("api", &short, "short").await.unwrap(), Some(json!(3)));
}

#[tokio::test]
async fn namespace_invalidation_leaves_other_namespaces_intact() {
    let cache = CacheManager::new(ephemeral()).unwrap();

    for i in 0..5 {
        let c = components([("id", json!(i))]);
        cache.set("alpha", &c, json!(i), "medium").await.unwrap();
    }
    for i in 0..3 {
        let c = components([("id", json!(i))]);
        cache.set("beta", &c, json!(i), "medium").await.unwrap();
    }

    let removed = cache.invalidate("alpha", None).await.unwrap();
    assert_eq!(removed, 5);

    for i in 0..5 {
        let c = components([("id", json!(i))]);
        assert_eq!(cache.get("alpha", &c, "medium").await.unwrap(), None);
    }
    for i in 0..3 {
        let c = components([("id", json!(i))]);
        assert_eq!(cache.get("beta", &c, "medium").await.unwrap(), Some(json!(i)));
    }
}

#[tokio::test]
async fn lru_eviction_spares_recently_used_entries() {
    let config = CacheConfig {
        db_path: None,
        memory_capacity: 3,
        enable_persistent: false,
        ..Default::default()
    };
    let cache = CacheManager::new(config).unwrap();

    let keys: Vec<_> = (0..4).map(|i| components([("id", json!(i))])).collect();
    for c in &keys[..3] {
        cache.set("api", c, json!("v"), "short").await.unwrap();
    }

    // Touch the oldest entry, then overflow capacity
    assert!(cache.get("api", &keys[0], "short").await.unwrap().is_some());
    cache.set("api", &keys[3], json!("v"), "short").await.unwrap();

    // The touched entry survived; the untouched oldest one was evicted
    assert!(cache.get("api", &keys[0], "short").await.unwrap().is_some());
    assert_eq!(cache.get("api", &keys[1], "short").await.unwrap(), None);

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.memory.counters.evictions, 1);
    assert_eq!(stats.memory.entry_count, 3);
}

#[tokio::test]
async fn stats_reflect_traffic_and_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        db_path: Some(dir.path().join("cache.db")),
        ..Default::default()
    };

    {
        let cache = CacheManager::new(config.clone()).unwrap();
        let c = components([("id", json!(1))]);
        cache.set("api", &c, json!("v"), "medium").await.unwrap();

        // Three memory hits, one full miss
        for _ in 0..3 {
            cache.get("api", &c, "medium").await.unwrap();
        }
        let missing = components([("id", json!(99))]);
        cache.get("api", &missing, "medium").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.memory.counters.hits, 3);
        assert_eq!(stats.memory.counters.misses, 1);
        assert!((stats.memory.hit_ratio - 0.75).abs() < 1e-9);
    }

    // The persistent tier's counters survive the restart
    let cache = CacheManager::new(config).unwrap();
    let stats = cache.stats().await.unwrap();
    let medium = stats
        .persistent
        .tiers
        .iter()
        .find(|t| t.tier == "medium")
        .unwrap();
    assert_eq!(medium.counters.inserts, 1);
    assert_eq!(medium.counters.misses, 1);
    assert_eq!(medium.entry_count, 1);
}

#[tokio::test]
async fn persistent_hits_promote_into_memory() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        db_path: Some(dir.path().join("cache.db")),
        ..Default::default()
    };
    let c = components([("id", json!(1))]);

    // First process writes through to disk
    {
        let cache = CacheManager::new(config.clone()).unwrap();
        cache.set("api", &c, json!("durable"), "long").await.unwrap();
    }

    // Second process starts cold: first get is a persistent hit
    let cache = CacheManager::new(config).unwrap();
    assert_eq!(
        cache.get("api", &c, "long").await.unwrap(),
        Some(json!("durable"))
    );

    // After promotion the entry is served from memory even with the
    // persistent store unreachable
    cache.persistent().unwrap().set_available(false);
    assert_eq!(
        cache.get("api", &c, "long").await.unwrap(),
        Some(json!("durable"))
    );

    let stats_err = cache.stats().await;
    assert!(stats_err.is_err());
}

#[tokio::test]
async fn concurrent_readers_and_writers_settle_consistently() {
    let cache = Arc::new(CacheManager::new(ephemeral()).unwrap());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            let c = components([("id", json!(i % 4))]);
            cache.set("load", &c, json!(i % 4), "short").await.unwrap();
            cache.get("load", &c, "short").await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Every surviving key holds the value written for it
    for i in 0..4 {
        let c = components([("id", json!(i))]);
        assert_eq!(cache.get("load", &c, "short").await.unwrap(), Some(json!(i)));
    }

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.memory.counters.inserts, 16);
}

#[tokio::test]
async fn solar_resource_end_to_end() {
    #[derive(Debug, Clone, Serialize)]
    struct Query {
        lat: f64,
        lon: f64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Resource {
        ghi: f64,
    }

    let manager = Arc::new(CacheManager::new(ephemeral()).unwrap());
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counted = Arc::clone(&calls);

    let fetch = wrap(
        Arc::clone(&manager),
        WrapConfig::new("solar_resource", "long"),
        move |_q: Query| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Resource { ghi: 4.83 })
            }
        },
    );

    let query = Query {
        lat: 39.7392,
        lon: -104.9903,
    };
    let first = fetch(query.clone()).await.unwrap();
    let second = fetch(query).await.unwrap();

    assert_eq!(first, Resource { ghi: 4.83 });
    assert_eq!(second, first);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    // The cached entry is addressable through the manager API as well
    let c = components([("lat", json!(39.7392)), ("lon", json!(-104.9903))]);
    assert_eq!(
        manager.get("solar_resource", &c, "long").await.unwrap(),
        Some(json!({"ghi": 4.83}))
    );
}
