//! Core data models: documents, vector records, and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::ContentHash;

/// Opaque document identifier (UUIDv4, stored as text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Mint a fresh random identifier.
    pub fn new() -> Self {
        DocId(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        DocId(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque vector identifier (UUIDv4, stored as text).
///
/// Always random; vector identity is never derived from the content
/// hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(String);

impl VectorId {
    pub fn new() -> Self {
        VectorId(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: String) -> Self {
        VectorId(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata describing a document at ingestion time, before it has a
/// row. The store assigns the `doc_id` on insert.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub content_hash: ContentHash,
    pub source_path: String,
    pub display_name: String,
    pub byte_size: i64,
    pub extension: Option<String>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
}

/// One unique piece of source content.
///
/// `content_hash` is unique across all documents; that uniqueness is
/// the dedup contract. `vector_ids` is empty until ingestion
/// completes, then lists the document's vectors in chunk order.
#[derive(Debug, Clone)]
pub struct Document {
    pub doc_id: DocId,
    pub content_hash: ContentHash,
    pub source_path: String,
    pub display_name: String,
    pub byte_size: i64,
    pub extension: Option<String>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    /// Derived text, set after ingestion (e.g. OCR output).
    pub content: Option<String>,
    pub vector_ids: Vec<VectorId>,
}

/// One chunk's embedding. Owned by its document: a vector record
/// never exists without, or outlives, its document row.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub vector_id: VectorId,
    pub doc_id: DocId,
    /// Zero-based position within the document's chunk sequence.
    /// `(doc_id, chunk_index)` is unique.
    pub chunk_index: u32,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Similarity-search scope: the whole corpus or a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Corpus,
    Document(DocId),
}

/// One ranked similarity-search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub vector_id: VectorId,
    pub doc_id: DocId,
    /// Cosine similarity against the query, in `[-1, 1]`.
    pub score: f32,
}
