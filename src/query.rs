//! Query service: semantic search and direct lookup.
//!
//! Orchestrates cache-check → embed → vector query → format for searches,
//! and cache-check → exact fetch → gated similarity fallback for lookups.
//! Owns its client handles (embedding, vector store, cache) so tests can
//! substitute fakes.
//!
//! Outcome taxonomy, kept distinct for callers:
//! - `Ok(vec![])` / `Ok(None)` — the service worked; nothing matched.
//! - `Err(..)` — an external service was unavailable after the serving
//!   path's single retry; the message names the service, never a raw
//!   transport error chain.
//!
//! Cache failures are invisible here by construction — the cache never
//! returns errors, only misses.

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

use crate::cache::{self, QueryCache};
use crate::embedding::Embedder;
use crate::models::{CacheStats, FunctionDetail, SearchHit};
use crate::vector_store::VectorIndex;

pub const DEFAULT_SEARCH_LIMIT: usize = 5;
pub const MAX_SEARCH_LIMIT: usize = 20;

/// Minimum similarity for the lookup fallback to accept a closest match.
const MIN_LOOKUP_SCORE: f32 = 0.5;

pub struct QueryService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorIndex>,
    cache: QueryCache,
}

impl QueryService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorIndex>,
        cache: QueryCache,
    ) -> Self {
        Self {
            embedder,
            store,
            cache,
        }
    }

    /// Semantic search over the indexed corpus.
    ///
    /// `limit` is clamped into `[1, 20]`; out-of-range requests are served,
    /// not rejected. Results come back in the store's similarity order and
    /// are never re-sorted. An empty result is a successful answer.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        let key = cache::search_key(query, limit);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(hits) = serde_json::from_str::<Vec<SearchHit>>(&cached) {
                return Ok(hits);
            }
            // Unreadable payload (format drift): drop it and refresh.
            self.cache.invalidate(&key).await;
        }

        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| unavailable("embedding", e))?;

        let matches = self
            .store
            .query(&query_vector, limit)
            .await
            .map_err(|e| unavailable("vector store", e))?;

        let mut hits: Vec<SearchHit> = matches
            .into_iter()
            .map(|m| SearchHit {
                kind: metadata_str(&m.metadata, "kind"),
                summary: metadata_str(&m.metadata, "summary"),
                path: m.id,
                score: m.score,
            })
            .collect();
        hits.truncate(limit);

        if let Ok(payload) = serde_json::to_string(&hits) {
            self.cache.set(&key, &payload).await;
        }

        Ok(hits)
    }

    /// Direct lookup by fully-qualified path.
    ///
    /// Tries an exact fetch first; when the id is absent, falls back to a
    /// similarity query seeded with the literal path and accepts the closest
    /// match only above a confidence floor. `Ok(None)` means "not found".
    pub async fn get_function(&self, function_path: &str) -> Result<Option<FunctionDetail>> {
        let path = function_path.trim();
        if path.is_empty() {
            bail!("function_path must not be empty");
        }

        let key = cache::function_key(path);
        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(detail) = serde_json::from_str::<FunctionDetail>(&cached) {
                return Ok(Some(detail));
            }
            self.cache.invalidate(&key).await;
        }

        let fetched = self
            .store
            .fetch(&[path.to_string()])
            .await
            .map_err(|e| unavailable("vector store", e))?;

        let detail = match fetched.into_iter().find(|m| m.id == path) {
            Some(m) => Some(detail_from_metadata(&m.id, &m.metadata)),
            None => {
                let query_vector = self
                    .embedder
                    .embed_query(path)
                    .await
                    .map_err(|e| unavailable("embedding", e))?;
                let matches = self
                    .store
                    .query(&query_vector, 1)
                    .await
                    .map_err(|e| unavailable("vector store", e))?;

                matches
                    .into_iter()
                    .next()
                    .filter(|m| m.score >= MIN_LOOKUP_SCORE)
                    .map(|m| detail_from_metadata(&m.id, &m.metadata))
            }
        };

        if let Some(detail) = &detail {
            if let Ok(payload) = serde_json::to_string(detail) {
                self.cache.set(&key, &payload).await;
            }
        }

        Ok(detail)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn sweep_cache(&self) -> u64 {
        self.cache.sweep_expired().await
    }
}

/// Normalized failure for callers: names the failing service, keeps the
/// cause text, drops the transport error type.
fn unavailable(service: &str, err: anyhow::Error) -> anyhow::Error {
    anyhow!("{} service unavailable: {}", service, err)
}

fn metadata_str(metadata: &serde_json::Value, field: &str) -> String {
    metadata
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Rebuild lookup detail from the metadata stored beside a vector.
pub fn detail_from_metadata(id: &str, metadata: &serde_json::Value) -> FunctionDetail {
    FunctionDetail {
        path: id.to_string(),
        kind: metadata
            .get("kind")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        signature: metadata
            .get("signature")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        summary: metadata_str(metadata, "summary"),
        full_text: metadata_str(metadata, "text"),
    }
}

// ============ CLI formatting ============

/// Render search hits as a readable block for terminal use.
pub fn format_search_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for '{}'", query);
    }

    let mut out = vec![format!("Search results for '{}':", query), String::new()];
    for (i, hit) in hits.iter().enumerate() {
        out.push(format!("{}. {} ({})", i + 1, hit.path, hit.kind));
        out.push(format!("   score: {:.3}", hit.score));
        if !hit.summary.is_empty() {
            out.push(format!("   {}", hit.summary));
        }
        out.push(String::new());
    }
    out.join("\n")
}

/// Render one entry's full detail for terminal use.
pub fn format_function_detail(detail: &FunctionDetail) -> String {
    let mut out = vec![
        format!("{} ({})", detail.path, detail.kind),
        String::new(),
    ];
    if let Some(sig) = &detail.signature {
        out.push(format!("signature: {}", sig));
    }
    if !detail.summary.is_empty() {
        out.push(detail.summary.clone());
    }
    if !detail.full_text.is_empty() {
        out.push(String::new());
        out.push(detail.full_text.clone());
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_from_metadata_reads_all_fields() {
        let metadata = serde_json::json!({
            "kind": "function",
            "summary": "Subdivide selected edges.",
            "signature": "subdivide(cuts=1)",
            "text": "Path: pkg.ops.mesh.subdivide",
        });
        let detail = detail_from_metadata("pkg.ops.mesh.subdivide", &metadata);
        assert_eq!(detail.path, "pkg.ops.mesh.subdivide");
        assert_eq!(detail.kind, "function");
        assert_eq!(detail.signature.as_deref(), Some("subdivide(cuts=1)"));
        assert_eq!(detail.summary, "Subdivide selected edges.");
    }

    #[test]
    fn detail_tolerates_sparse_metadata() {
        let detail = detail_from_metadata("pkg.x", &serde_json::json!({}));
        assert_eq!(detail.kind, "unknown");
        assert!(detail.signature.is_none());
        assert!(detail.summary.is_empty());
    }

    #[test]
    fn empty_hits_format_as_no_results() {
        let rendered = format_search_hits("create mesh", &[]);
        assert!(rendered.contains("No results found"));
    }

    #[test]
    fn hits_format_in_order_with_scores() {
        let hits = vec![
            SearchHit {
                path: "pkg.a".into(),
                kind: "function".into(),
                summary: "First.".into(),
                score: 0.91,
            },
            SearchHit {
                path: "pkg.b".into(),
                kind: "class".into(),
                summary: String::new(),
                score: 0.72,
            },
        ];
        let rendered = format_search_hits("q", &hits);
        let a_pos = rendered.find("pkg.a").unwrap();
        let b_pos = rendered.find("pkg.b").unwrap();
        assert!(a_pos < b_pos);
        assert!(rendered.contains("0.910"));
    }
}
