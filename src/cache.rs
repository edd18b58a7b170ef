//! Local query cache with TTL expiry.
//!
//! A SQLite-backed key-value store that sits in front of the serving path.
//! Keys are deterministic hashes of the operation and its normalized
//! arguments, so equivalent queries hit the same row. An entry is valid iff
//! `now < expires_at`; expired rows read as misses and are deleted on that
//! read, with a sweep at process start catching the rest.
//!
//! The defining behavior is graceful degradation: if the backing store cannot
//! be created or opened, the cache disables itself for the remainder of the
//! process — every `get` misses, every `set` is a silent no-op, and no error
//! ever crosses this module's boundary. Callers lose acceleration, never
//! availability.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::CacheConfig;
use crate::db;
use crate::models::CacheStats;

pub const DB_FILE: &str = "docdex_cache.db";

/// TTL key-value cache over SQLite, or a null object when storage failed.
pub struct QueryCache {
    pool: Option<SqlitePool>,
    ttl_seconds: i64,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

impl QueryCache {
    /// Try to open the cache; degrade to a disabled pass-through on failure.
    ///
    /// Never returns an error: an unusable cache directory (permission
    /// denied, file in the way) yields a cache where every read misses.
    pub async fn open(config: &CacheConfig) -> Self {
        match Self::try_open(&config.dir, config.ttl_seconds).await {
            Ok(cache) => cache,
            Err(e) => {
                eprintln!(
                    "Warning: cache storage unavailable ({}); continuing without cache",
                    e
                );
                Self::disabled(config.ttl_seconds)
            }
        }
    }

    /// A permanently disabled cache: all gets miss, all sets are no-ops.
    pub fn disabled(ttl_seconds: i64) -> Self {
        Self {
            pool: None,
            ttl_seconds,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    async fn try_open(dir: &Path, ttl_seconds: i64) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let pool = db::connect(&dir.join(DB_FILE)).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS query_cache (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_query_cache_expires ON query_cache(expires_at)",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool: Some(pool),
            ttl_seconds,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Look up a payload. Expired entries read as misses and are removed.
    pub async fn get(&self, key: &str) -> Option<String> {
        let Some(pool) = &self.pool else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let now = chrono::Utc::now().timestamp();
        let row = sqlx::query("SELECT payload, expires_at FROM query_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

        match row {
            Some(row) => {
                let expires_at: i64 = row.get("expires_at");
                if now < expires_at {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Some(row.get("payload"))
                } else {
                    let deleted = sqlx::query("DELETE FROM query_cache WHERE key = ?")
                        .bind(key)
                        .execute(pool)
                        .await
                        .map(|r| r.rows_affected())
                        .unwrap_or(0);
                    self.evicted.fetch_add(deleted, Ordering::Relaxed);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a payload under the configured TTL. Failures are swallowed.
    pub async fn set(&self, key: &str, payload: &str) {
        let Some(pool) = &self.pool else {
            return;
        };

        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO query_cache (key, payload, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(now)
        .bind(now + self.ttl_seconds)
        .execute(pool)
        .await;

        if let Err(e) = result {
            eprintln!("Warning: cache write failed: {}", e);
        }
    }

    /// Remove one entry, expired or not.
    pub async fn invalidate(&self, key: &str) {
        let Some(pool) = &self.pool else {
            return;
        };
        let _ = sqlx::query("DELETE FROM query_cache WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await;
    }

    /// Delete every expired row. Run at process start; returns rows removed.
    pub async fn sweep_expired(&self) -> u64 {
        let Some(pool) = &self.pool else {
            return 0;
        };

        let now = chrono::Utc::now().timestamp();
        let deleted = sqlx::query("DELETE FROM query_cache WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await
            .map(|r| r.rows_affected())
            .unwrap_or(0);

        self.evicted.fetch_add(deleted, Ordering::Relaxed);
        deleted
    }

    /// Drop every entry.
    pub async fn clear(&self) -> u64 {
        let Some(pool) = &self.pool else {
            return 0;
        };
        sqlx::query("DELETE FROM query_cache")
            .execute(pool)
            .await
            .map(|r| r.rows_affected())
            .unwrap_or(0)
    }

    /// Counters for this process plus the current row count.
    pub async fn stats(&self) -> CacheStats {
        let entry_count = match &self.pool {
            Some(pool) => sqlx::query_scalar("SELECT COUNT(*) FROM query_cache")
                .fetch_one(pool)
                .await
                .unwrap_or(0),
            None => 0,
        };

        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            entry_count,
            evicted_count: self.evicted.load(Ordering::Relaxed),
            enabled: self.pool.is_some(),
        }
    }
}

// ============ Key derivation ============

/// Cache key for a semantic search: operation + normalized query + limit.
pub fn search_key(query: &str, limit: usize) -> String {
    hash_key(&format!("search:{}:{}", normalize_query(query), limit))
}

/// Cache key for a direct lookup. Paths keep their case: lowercasing would
/// conflate case-distinct identifiers like `pkg.Mesh` and `pkg.mesh`.
pub fn function_key(path: &str) -> String {
    hash_key(&format!("function:{}", path.trim()))
}

/// Case- and whitespace-insensitive query normalization, so equivalent
/// queries map to the same key.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn hash_key(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
