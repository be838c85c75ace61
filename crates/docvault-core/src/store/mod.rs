//! Storage abstraction.
//!
//! [`DocumentStore`] is the authoritative, content-addressed table of
//! documents; [`VectorStore`] owns their embeddings. [`Store`] binds
//! the two together and adds the one operation that must span both:
//! the atomic persistence of a document and its full vector set as a
//! single unit.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! The in-memory backend used by tests lives in [`memory`].

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::ContentHash;
use crate::models::{
    DocId, Document, DocumentMeta, SearchHit, SearchScope, VectorId, VectorRecord,
};

/// Persistent entity store for document metadata.
///
/// Enforces one row per unique content hash. The uniqueness must be
/// enforced by the storage layer itself (a constraint), not only by a
/// prior [`find_by_hash`](DocumentStore::find_by_hash) check, so it
/// holds under concurrent inserts of identical content.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Dedup lookup. `Ok(None)` means the content is genuinely new; a
    /// storage failure is an error, never "no duplicate".
    async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<DocId>>;

    /// Create a new document row.
    ///
    /// Fails with [`StoreError::DuplicateContent`](crate::error::StoreError::DuplicateContent)
    /// if a row with the same content hash already exists.
    async fn insert(&self, meta: &DocumentMeta) -> Result<DocId>;

    /// Record which vector identifiers belong to a document, in chunk
    /// order, after the vector store has assigned them.
    async fn set_vector_ids(&self, doc_id: &DocId, vector_ids: &[VectorId]) -> Result<()>;

    /// Overwrite the derived text field. Idempotent.
    async fn set_content(&self, doc_id: &DocId, text: &str) -> Result<()>;

    /// Fetch a document, or [`StoreError::NotFound`](crate::error::StoreError::NotFound).
    async fn get(&self, doc_id: &DocId) -> Result<Document>;
}

/// Persistent store for per-chunk embeddings, keyed by document and
/// chunk position.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist a batch of `(chunk_index, embedding)` pairs for one
    /// document, atomically: all rows land or none do. Returns the
    /// assigned vector ids in batch order.
    ///
    /// Rejects batches that repeat a chunk index or collide with
    /// stored `(doc_id, chunk_index)` pairs.
    async fn insert_batch(
        &self,
        doc_id: &DocId,
        batch: &[(u32, Vec<f32>)],
    ) -> Result<Vec<VectorId>>;

    /// All vector records for a document, ordered by `chunk_index`
    /// ascending.
    async fn get_for_document(&self, doc_id: &DocId) -> Result<Vec<VectorRecord>>;

    /// Cosine-similarity search over the given scope. See
    /// [`similarity::rank`](crate::similarity::rank) for the scoring
    /// and ordering contract.
    async fn similarity_search(
        &self,
        query: &[f32],
        scope: SearchScope,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// A complete storage backend: documents, vectors, and the atomic
/// ingestion write that spans both.
#[async_trait]
pub trait Store: DocumentStore + VectorStore {
    /// Atomically insert the document row, its vector batch (one
    /// embedding per chunk, indexed from 0), and the vector-id
    /// backfill, in one transaction.
    ///
    /// On any failure the entire transaction rolls back: a document
    /// row never exists without its full vector set, and vice versa.
    /// A concurrent insert of the same content hash surfaces as
    /// [`StoreError::DuplicateContent`](crate::error::StoreError::DuplicateContent),
    /// which the caller resolves to the winner's `doc_id`.
    async fn persist_ingestion(
        &self,
        meta: &DocumentMeta,
        embeddings: &[Vec<f32>],
    ) -> Result<(DocId, Vec<VectorId>)>;
}
