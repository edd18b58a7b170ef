//! Core data models used throughout docdex.
//!
//! These types represent the documentation entries, embedding records, and
//! query results that flow through the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Category of a documented API element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Module,
    Class,
    Method,
    Function,
    Property,
    Constant,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Module => "module",
            EntryKind::Class => "class",
            EntryKind::Method => "method",
            EntryKind::Function => "function",
            EntryKind::Property => "property",
            EntryKind::Constant => "constant",
        }
    }
}

/// One addressable unit of documentation, produced by the extractor.
///
/// `path` is the fully-qualified dotted identifier (e.g. `bpy.ops.mesh.subdivide`)
/// and is the unique key within the corpus. `full_text` is the concatenated
/// text the embedding is built from; entries whose `full_text` is empty are
/// dropped before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocEntry {
    pub path: String,
    pub kind: EntryKind,
    pub signature: Option<String>,
    pub summary: String,
    pub full_text: String,
    pub module_path: String,
}

/// An (id, vector, metadata) triple ready for upsert into the vector store.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub path: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// A single match returned by the vector store's similarity query.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// A formatted semantic-search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub kind: String,
    pub summary: String,
    pub score: f32,
}

/// Full detail for one entry, returned by direct lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDetail {
    pub path: String,
    pub kind: String,
    pub signature: Option<String>,
    pub summary: String,
    pub full_text: String,
}

/// Process-wide artifact written after each indexing run.
///
/// Read by `docdex modules` and operators for diagnostics; the serving path
/// never consults the remote store for module listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    pub total_entries: usize,
    pub index_name: String,
    pub embedding_model: String,
    pub modules: Vec<String>,
    pub indexed_at: i64,
}

/// Cache statistics snapshot exposed by the `cache_stats` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub entry_count: i64,
    pub evicted_count: u64,
    pub enabled: bool,
}
