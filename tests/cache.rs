//! Behavior tests for the local query cache: TTL expiry, degradation, and
//! maintenance operations against a real SQLite store in a scratch directory.

use std::path::PathBuf;

use docdex::cache::QueryCache;
use docdex::config::CacheConfig;

fn cache_config(dir: PathBuf, ttl_seconds: i64) -> CacheConfig {
    CacheConfig { dir, ttl_seconds }
}

#[tokio::test]
async fn set_then_get_returns_payload() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await;
    assert!(cache.is_enabled());

    cache.set("k1", "payload-1").await;
    assert_eq!(cache.get("k1").await.as_deref(), Some("payload-1"));
}

#[tokio::test]
async fn expired_entry_reads_as_miss_and_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    // TTL of zero: expires_at == created_at, so the entry is never valid.
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 0)).await;

    cache.set("k1", "stale").await;
    assert_eq!(cache.get("k1").await, None);

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 0, "expired row should be deleted on read");
    assert_eq!(stats.evicted_count, 1);
}

#[tokio::test]
async fn overwrite_replaces_payload() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await;

    cache.set("k1", "first").await;
    cache.set("k1", "second").await;
    assert_eq!(cache.get("k1").await.as_deref(), Some("second"));

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 1);
}

#[tokio::test]
async fn invalidate_removes_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await;

    cache.set("k1", "payload").await;
    cache.invalidate("k1").await;
    assert_eq!(cache.get("k1").await, None);
}

#[tokio::test]
async fn sweep_removes_only_expired_rows() {
    let tmp = tempfile::tempdir().unwrap();

    // Two caches over the same storage: one writes rows that are already
    // expired, the other writes valid rows.
    let dir = tmp.path().join("cache");
    let expired_writer = QueryCache::open(&cache_config(dir.clone(), 0)).await;
    expired_writer.set("old1", "x").await;
    expired_writer.set("old2", "x").await;

    let cache = QueryCache::open(&cache_config(dir, 3600)).await;
    cache.set("fresh", "y").await;

    let removed = cache.sweep_expired().await;
    assert_eq!(removed, 2);
    assert_eq!(cache.get("fresh").await.as_deref(), Some("y"));
}

#[tokio::test]
async fn clear_drops_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await;

    cache.set("a", "1").await;
    cache.set("b", "2").await;
    assert_eq!(cache.clear().await, 2);
    assert_eq!(cache.stats().await.entry_count, 0);
}

#[tokio::test]
async fn unopenable_storage_degrades_to_pass_through() {
    let tmp = tempfile::tempdir().unwrap();

    // A regular file where the cache directory should be: create_dir_all fails.
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "occupied").unwrap();

    let cache = QueryCache::open(&cache_config(blocker.join("cache"), 3600)).await;
    assert!(!cache.is_enabled());

    // Every set is a silent no-op, every get a miss; nothing panics.
    cache.set("k1", "payload").await;
    assert_eq!(cache.get("k1").await, None);
    cache.invalidate("k1").await;
    assert_eq!(cache.sweep_expired().await, 0);

    let stats = cache.stats().await;
    assert!(!stats.enabled);
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.hit_count, 0);
    assert_eq!(stats.miss_count, 1);
}

#[tokio::test]
async fn stats_count_hits_and_misses() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await;

    cache.set("k1", "v").await;
    cache.get("k1").await; // hit
    cache.get("k1").await; // hit
    cache.get("missing").await; // miss

    let stats = cache.stats().await;
    assert_eq!(stats.hit_count, 2);
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.entry_count, 1);
}

#[tokio::test]
async fn concurrent_writers_never_tear() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = std::sync::Arc::new(
        QueryCache::open(&cache_config(tmp.path().join("cache"), 3600)).await,
    );

    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..20 {
                let key = format!("k{}", j % 5);
                cache.set(&key, &format!("w{}-{}", i, j)).await;
                let _ = cache.get(&key).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every surviving payload is one that some writer fully wrote.
    for j in 0..5 {
        let value = cache.get(&format!("k{}", j)).await.unwrap();
        assert!(value.starts_with('w') && value.contains('-'));
    }
}
