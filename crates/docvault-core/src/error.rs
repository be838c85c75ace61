//! Error taxonomy for the store and collaborator traits.
//!
//! Storage failures are typed so callers can distinguish the dedup
//! fast path ([`StoreError::DuplicateContent`]) from genuine write
//! failures, and a missing row ([`StoreError::NotFound`]) from a
//! backend that is down ([`StoreError::Connection`]). None of these
//! are ever collapsed into a silent `None`.

use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by [`DocumentStore`](crate::store::DocumentStore)
/// and [`VectorStore`](crate::store::VectorStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with this content hash already exists.
    ///
    /// Not fatal: the caller resolves it to the existing `doc_id` and
    /// treats the content as already ingested.
    #[error("duplicate content: a document with hash {content_hash} already exists")]
    DuplicateContent { content_hash: String },

    /// Lookup by id against a row that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend unreachable, after the single bounded reconnect attempt.
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// Failure inside the atomic persistence transaction. The whole
    /// transaction (document row + vector batch + id backfill) has
    /// been rolled back.
    #[error("storage transaction failed: {0}")]
    Transaction(String),

    /// The query vector has zero magnitude, so cosine similarity is
    /// undefined and no ranking is possible. Zero-magnitude stored
    /// candidates are instead skipped individually.
    #[error("query vector has zero magnitude; similarity ranking is undefined")]
    ZeroNormQuery,

    /// A vector batch repeats a chunk index, or collides with a
    /// `(doc_id, chunk_index)` pair already stored.
    #[error("invalid vector batch: {0}")]
    InvalidBatch(String),
}

/// Failures from an [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).
///
/// Always raised before any storage write, so there is nothing to
/// roll back; the caller decides the retry policy.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    /// Provider call failed (network error, rate limit after retries,
    /// rejected request).
    #[error("embedding request failed: {0}")]
    Provider(String),

    /// The provider answered, but not with one vector of the expected
    /// dimensionality per input text.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// Failure extracting text blocks from raw document bytes.
#[derive(Debug, Error)]
#[error("document loader failed: {0}")]
pub struct LoaderError(pub String);
