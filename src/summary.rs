//! Index summary artifact.
//!
//! A small JSON file written after each successful indexing run: total entry
//! count, the distinct module paths covered, and a timestamp. Operators read
//! it for diagnostics and `docdex modules` serves listings from it — the
//! serving path never asks the remote store which modules exist.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::IndexSummary;

pub const SUMMARY_FILE: &str = "index_summary.json";

/// Write the artifact, creating the parent directory if needed.
pub fn write_summary(path: &Path, summary: &IndexSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write index summary to {}", path.display()))?;
    Ok(())
}

/// Read the artifact written by the last indexing run.
pub fn read_summary(path: &Path) -> Result<IndexSummary> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "No index summary at {} — run `docdex index` first",
            path.display()
        )
    })?;
    let summary: IndexSummary =
        serde_json::from_str(&content).with_context(|| "Failed to parse index summary")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SUMMARY_FILE);

        let summary = IndexSummary {
            total_entries: 42,
            index_name: "api-docs".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            modules: vec!["pkg.ops".to_string(), "pkg.types".to_string()],
            indexed_at: 1_700_000_000,
        };

        write_summary(&path, &summary).unwrap();
        let restored = read_summary(&path).unwrap();
        assert_eq!(restored.total_entries, 42);
        assert_eq!(restored.modules, summary.modules);
    }

    #[test]
    fn missing_summary_is_a_clear_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_summary(&dir.path().join(SUMMARY_FILE)).unwrap_err();
        assert!(err.to_string().contains("docdex index"));
    }
}
