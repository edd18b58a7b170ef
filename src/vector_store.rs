//! Vector store client.
//!
//! Defines the [`VectorIndex`] trait — upsert, similarity query, and exact
//! fetch against a remote nearest-neighbor index — plus the
//! [`PineconeIndex`] implementation speaking the serverless data-plane HTTP
//! API. The trait is the substitution seam for tests, mirroring
//! [`crate::embedding::Embedder`].
//!
//! Matches from `query` are returned in the store's native order (descending
//! similarity); callers must not re-sort them.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::Config;
use crate::embedding::backoff_delay;
use crate::models::{EmbeddingRecord, VectorMatch};

/// A remote vector similarity index addressed by entry path.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert one batch of records. Callers batch; a single call must fit
    /// the store's payload limit.
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Nearest-neighbor query: up to `top_k` matches, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Exact fetch by id. Absent ids are simply missing from the result.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorMatch>>;
}

/// HTTP client for a Pinecone-style index data plane.
pub struct PineconeIndex {
    host: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl PineconeIndex {
    /// Build a client from configuration with the given retry count.
    pub fn new(config: &Config, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.embedding.timeout_secs))
            .build()?;

        Ok(Self {
            host: config.index_host.trim_end_matches('/').to_string(),
            api_key: config.vector_api_key.clone(),
            max_retries,
            client,
        })
    }

    /// Send a request with the shared retry policy: 429/5xx and transport
    /// errors retry with backoff, other client errors fail immediately.
    async fn execute_with_retry(&self, req: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let Some(attempt_req) = req.try_clone() else {
                bail!("Vector store request is not retryable");
            };

            match attempt_req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow!("Vector store error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Vector store error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Vector store request failed after retries")))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.path,
                    "values": r.vector,
                    "metadata": r.metadata,
                })
            })
            .collect();

        let req = self
            .client
            .post(format!("{}/vectors/upsert", self.host))
            .header("Api-Key", &self.api_key)
            .json(&serde_json::json!({ "vectors": vectors }));

        self.execute_with_retry(req).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let req = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&serde_json::json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true,
            }));

        let json = self.execute_with_retry(req).await?;
        parse_matches(&json)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorMatch>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        let req = self
            .client
            .get(format!("{}/vectors/fetch", self.host))
            .header("Api-Key", &self.api_key)
            .query(&query);

        let json = self.execute_with_retry(req).await?;
        parse_fetched(&json)
    }
}

/// Parse a `/query` response: `{"matches": [{"id", "score", "metadata"}]}`,
/// preserving the store's order.
fn parse_matches(json: &serde_json::Value) -> Result<Vec<VectorMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow!("Invalid query response: missing matches array"))?;

    Ok(matches
        .iter()
        .filter_map(|m| {
            let id = m.get("id")?.as_str()?.to_string();
            let score = m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
            let metadata = m.get("metadata").cloned().unwrap_or(serde_json::json!({}));
            Some(VectorMatch {
                id,
                score,
                metadata,
            })
        })
        .collect())
}

/// Parse a `/vectors/fetch` response: `{"vectors": {"<id>": {...}}}`.
/// Exact fetches carry no similarity score; present ids are exact matches.
fn parse_fetched(json: &serde_json::Value) -> Result<Vec<VectorMatch>> {
    let vectors = json
        .get("vectors")
        .and_then(|v| v.as_object())
        .ok_or_else(|| anyhow!("Invalid fetch response: missing vectors map"))?;

    Ok(vectors
        .iter()
        .map(|(id, record)| VectorMatch {
            id: id.clone(),
            score: 1.0,
            metadata: record
                .get("metadata")
                .cloned()
                .unwrap_or(serde_json::json!({})),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_matches_keeps_store_order() {
        let json = serde_json::json!({
            "matches": [
                {"id": "a.b", "score": 0.9, "metadata": {"kind": "function"}},
                {"id": "a.c", "score": 0.7},
            ]
        });
        let matches = parse_matches(&json).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a.b");
        assert!((matches[0].score - 0.9).abs() < 1e-6);
        assert_eq!(matches[1].id, "a.c");
        assert_eq!(matches[1].metadata, serde_json::json!({}));
    }

    #[test]
    fn parse_matches_rejects_bad_shape() {
        assert!(parse_matches(&serde_json::json!({"rows": []})).is_err());
    }

    #[test]
    fn parse_fetched_reads_vector_map() {
        let json = serde_json::json!({
            "vectors": {
                "pkg.mod.f": {"id": "pkg.mod.f", "metadata": {"summary": "does f"}}
            }
        });
        let fetched = parse_fetched(&json).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "pkg.mod.f");
        assert_eq!(fetched[0].metadata["summary"], "does f");
    }
}
