//! Embedding provider trait.
//!
//! The model itself is an external collaborator; this crate only
//! defines the calling contract. Concrete providers (OpenAI-backed
//! with retry/backoff, disabled) live in the `docvault` crate.

use async_trait::async_trait;

use crate::error::EmbedError;

/// Produces one embedding vector per input text, preserving order.
///
/// All vectors from one provider share the same dimensionality
/// ([`dims`](EmbeddingProvider::dims)); that fixes the
/// dimensionality for the whole deployment.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts. The result has exactly one vector per
    /// input, in input order. An empty batch yields an empty result
    /// without calling the backend.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}
