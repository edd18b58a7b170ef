//! Indexing run: documentation pages → extracted entries → embeddings →
//! vector store → summary artifact.
//!
//! An offline batch job. Extraction failures skip the page with a warning
//! and the run continues; an embedding batch that exhausts its retries
//! aborts the whole run, because a partial vector set would leave the
//! remote index half-replaced. Upserts that fail partway leave prior
//! batches in place — re-running the index converges.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract;
use crate::models::{DocEntry, EmbeddingRecord, EntryKind, IndexSummary};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::summary;
use crate::vector_store::VectorIndex;

/// Upsert payload limit accepted by the vector store, in records.
const UPSERT_BATCH_SIZE: usize = 100;
/// Longest `text` body carried in remote metadata.
const TEXT_METADATA_MAX: usize = 2000;

/// Run a full indexing pass over `docs_dir`.
pub async fn run_index(
    config: &Config,
    embedder: &dyn Embedder,
    store: &dyn VectorIndex,
    docs_dir: &Path,
    dry_run: bool,
    progress: &dyn IndexProgressReporter,
) -> Result<()> {
    let pages = collect_pages(docs_dir)?;
    if pages.is_empty() {
        anyhow::bail!("No HTML pages found under {}", docs_dir.display());
    }

    let total_pages = pages.len() as u64;
    let mut entries: Vec<DocEntry> = Vec::new();
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut skipped_pages = 0usize;
    let mut duplicate_entries = 0usize;

    for (i, page) in pages.iter().enumerate() {
        let html = match std::fs::read_to_string(page) {
            Ok(html) => html,
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", page.display(), e);
                skipped_pages += 1;
                continue;
            }
        };

        let page_entries = extract::extract_entries(&html);
        if page_entries.is_empty() {
            eprintln!(
                "Warning: no API elements recognized in {}",
                page.display()
            );
            skipped_pages += 1;
        }

        for entry in page_entries {
            if seen_paths.insert(entry.path.clone()) {
                entries.push(entry);
            } else {
                duplicate_entries += 1;
            }
        }

        progress.report(IndexProgressEvent::Parsing {
            n: (i + 1) as u64,
            total: total_pages,
        });
    }

    // Entries with no extractable text cannot be embedded.
    let before = entries.len();
    entries.retain(|e| !e.full_text.trim().is_empty());
    let dropped_empty = before - entries.len();

    let batch_size = config.embedding.batch_size;
    let embed_batches = entries.len().div_ceil(batch_size);

    if dry_run {
        println!("index (dry-run)");
        println!("  pages: {} ({} skipped)", pages.len(), skipped_pages);
        println!(
            "  entries: {} ({} duplicate, {} empty)",
            entries.len(),
            duplicate_entries,
            dropped_empty
        );
        println!("  embedding batches: {}", embed_batches);
        return Ok(());
    }

    if entries.is_empty() {
        anyhow::bail!("No indexable entries extracted from {}", docs_dir.display());
    }

    let records = embed_entries(
        embedder,
        &entries,
        batch_size,
        config.embedding.batch_delay_ms,
        progress,
    )
    .await
    .context("Embedding failed; aborting indexing run")?;

    let upsert_batches = records.len().div_ceil(UPSERT_BATCH_SIZE);
    for (i, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
        store
            .upsert(batch)
            .await
            .with_context(|| format!("Upsert batch {} / {} failed", i + 1, upsert_batches))?;
        progress.report(IndexProgressEvent::Upserting {
            batch: (i + 1) as u64,
            total: upsert_batches as u64,
        });
    }

    let index_summary = IndexSummary {
        total_entries: entries.len(),
        index_name: config.index_name.clone(),
        embedding_model: embedder.model_name().to_string(),
        modules: distinct_modules(&entries),
        indexed_at: chrono::Utc::now().timestamp(),
    };
    let summary_path = config.cache.dir.join(summary::SUMMARY_FILE);
    summary::write_summary(&summary_path, &index_summary)?;

    println!("index");
    println!("  pages: {} ({} skipped)", pages.len(), skipped_pages);
    println!(
        "  entries: {} ({} duplicate, {} empty)",
        entries.len(),
        duplicate_entries,
        dropped_empty
    );
    println!("  embedded: {} in {} batches", records.len(), embed_batches);
    println!("  upserted: {} batches", upsert_batches);
    println!("  summary: {}", summary_path.display());

    Ok(())
}

/// Embed all entries in fixed-size batches, pairing each vector back to its
/// entry by position. Issues ⌈N / batch_size⌉ embedding calls; any batch
/// failure propagates and aborts the caller's run.
pub async fn embed_entries(
    embedder: &dyn Embedder,
    entries: &[DocEntry],
    batch_size: usize,
    batch_delay_ms: u64,
    progress: &dyn IndexProgressReporter,
) -> Result<Vec<EmbeddingRecord>> {
    let total_batches = entries.len().div_ceil(batch_size) as u64;
    let mut records = Vec::with_capacity(entries.len());

    for (i, batch) in entries.chunks(batch_size).enumerate() {
        if i > 0 && batch_delay_ms > 0 {
            // Pacing between batches keeps the service's rate limiter happy.
            tokio::time::sleep(Duration::from_millis(batch_delay_ms)).await;
        }

        let texts: Vec<String> = batch.iter().map(|e| e.full_text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding batch {} returned {} vectors for {} entries",
                i + 1,
                vectors.len(),
                batch.len()
            );
        }

        for (entry, vector) in batch.iter().zip(vectors) {
            records.push(EmbeddingRecord {
                path: entry.path.clone(),
                vector,
                metadata: entry_metadata(entry),
            });
        }

        progress.report(IndexProgressEvent::Embedding {
            batch: (i + 1) as u64,
            total: total_batches,
        });
    }

    Ok(records)
}

/// Metadata stored beside each vector. Everything a lookup needs to render
/// detail without a second source of truth.
pub fn entry_metadata(entry: &DocEntry) -> serde_json::Value {
    let mut metadata = serde_json::json!({
        "kind": entry.kind.as_str(),
        "summary": entry.summary,
        "module_path": entry.module_path,
        "text": truncate_chars(&entry.full_text, TEXT_METADATA_MAX),
    });
    if let Some(sig) = &entry.signature {
        metadata["signature"] = serde_json::json!(sig);
    }
    metadata
}

/// Distinct module paths covered by the corpus: every entry's owning module
/// plus every module entry's own path.
fn distinct_modules(entries: &[DocEntry]) -> Vec<String> {
    let mut modules: HashSet<String> = HashSet::new();
    for entry in entries {
        if !entry.module_path.is_empty() {
            modules.insert(entry.module_path.clone());
        }
        if entry.kind == EntryKind::Module {
            modules.insert(entry.path.clone());
        }
    }
    let mut modules: Vec<String> = modules.into_iter().collect();
    modules.sort();
    modules
}

/// All `.html` files under the corpus directory, sorted for determinism.
fn collect_pages(docs_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !docs_dir.is_dir() {
        anyhow::bail!("Not a directory: {}", docs_dir.display());
    }

    let mut pages: Vec<std::path::PathBuf> = WalkDir::new(docs_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("html"))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    pages.sort();
    Ok(pages)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> DocEntry {
        DocEntry {
            path: path.to_string(),
            kind: EntryKind::Function,
            signature: Some(format!("{}()", path)),
            summary: format!("Does {}", path),
            full_text: format!("Path: {}\n\nKind: function", path),
            module_path: path.rsplit_once('.').map(|(p, _)| p.to_string()).unwrap_or_default(),
        }
    }

    #[test]
    fn metadata_carries_lookup_fields() {
        let e = entry("pkg.mod.f");
        let metadata = entry_metadata(&e);
        assert_eq!(metadata["kind"], "function");
        assert_eq!(metadata["module_path"], "pkg.mod");
        assert_eq!(metadata["signature"], "pkg.mod.f()");
        assert!(metadata["text"].as_str().unwrap().contains("pkg.mod.f"));
    }

    #[test]
    fn metadata_omits_absent_signature() {
        let mut e = entry("pkg.mod.f");
        e.signature = None;
        let metadata = entry_metadata(&e);
        assert!(metadata.get("signature").is_none());
    }

    #[test]
    fn distinct_modules_dedups_and_sorts() {
        let mut module_entry = entry("pkg.ops");
        module_entry.kind = EntryKind::Module;
        module_entry.module_path = "pkg".to_string();

        let entries = vec![entry("pkg.ops.f"), entry("pkg.ops.g"), module_entry];
        assert_eq!(distinct_modules(&entries), vec!["pkg", "pkg.ops"]);
    }
}
