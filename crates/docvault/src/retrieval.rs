//! Similarity retrieval over the stored vector index.

use std::sync::Arc;

use tracing::debug;

use docvault_core::error::Result;
use docvault_core::models::{DocId, SearchHit, SearchScope};
use docvault_core::store::VectorStore;

pub const DEFAULT_THRESHOLD: f32 = 0.8;
pub const DEFAULT_TOP_K: usize = 5;

/// Thin wrapper that applies retrieval defaults before delegating to
/// the store's similarity search.
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    threshold: f32,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            threshold: DEFAULT_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_defaults(store: Arc<dyn VectorStore>, threshold: f32, top_k: usize) -> Self {
        Self {
            store,
            threshold,
            top_k,
        }
    }

    /// Search every stored vector.
    pub async fn search_corpus(
        &self,
        query: &[f32],
        threshold: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.search(query, SearchScope::Corpus, threshold, top_k)
            .await
    }

    /// Search only the vectors belonging to one document.
    pub async fn search_document(
        &self,
        query: &[f32],
        doc_id: DocId,
        threshold: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.search(query, SearchScope::Document(doc_id), threshold, top_k)
            .await
    }

    async fn search(
        &self,
        query: &[f32],
        scope: SearchScope,
        threshold: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let threshold = threshold.unwrap_or(self.threshold);
        let top_k = top_k.unwrap_or(self.top_k);
        debug!(threshold, top_k, "running similarity search");
        self.store
            .similarity_search(query, scope, threshold, top_k)
            .await
    }
}
