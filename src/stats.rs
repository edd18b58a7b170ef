//! Cache statistics overview.
//!
//! Prints a quick summary of the local cache: entry count, hit/miss counters
//! for this process, and storage state. Used by `docdex cache stats` to give
//! confidence that the cache is accepting writes and expiring rows.

use anyhow::Result;

use crate::cache::{QueryCache, DB_FILE};
use crate::config::Config;

/// Run the cache stats command: open the cache and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let cache = QueryCache::open(&config.cache).await;
    let stats = cache.stats().await;

    let db_path = config.cache.dir.join(DB_FILE);
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("docdex — Cache Stats");
    println!("====================");
    println!();
    println!("  Storage:   {}", db_path.display());
    println!(
        "  State:     {}",
        if stats.enabled { "enabled" } else { "disabled" }
    );
    println!("  Size:      {}", format_bytes(db_size));
    println!("  TTL:       {}s", config.cache.ttl_seconds);
    println!();
    println!("  Entries:   {}", stats.entry_count);
    println!("  Hits:      {}", stats.hit_count);
    println!("  Misses:    {}", stats.miss_count);
    println!("  Evicted:   {}", stats.evicted_count);
    println!();

    Ok(())
}

/// Run the cache sweep command: delete expired rows and report the count.
pub async fn run_sweep(config: &Config) -> Result<()> {
    let cache = QueryCache::open(&config.cache).await;
    let removed = cache.sweep_expired().await;
    println!("cache sweep");
    println!("  expired entries removed: {}", removed);
    Ok(())
}

/// Run the cache clear command: drop every entry.
pub async fn run_clear(config: &Config) -> Result<()> {
    let cache = QueryCache::open(&config.cache).await;
    let removed = cache.clear().await;
    println!("cache clear");
    println!("  entries removed: {}", removed);
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
