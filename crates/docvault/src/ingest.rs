//! Ingestion pipeline: fingerprint, dedup, chunk, embed, persist.
//!
//! [`IngestionCoordinator`] drives one document through the pipeline.
//! The order of stages matters:
//!
//! 1. Fingerprint the raw bytes and look the hash up. A known hash
//!    short-circuits the whole pipeline with no side effects.
//! 2. Extract text, chunk it, and embed the chunks. None of this
//!    touches storage, so a failure here leaves the store untouched.
//! 3. Persist document and vectors in a single transaction.
//!
//! Two concurrent ingestions of identical bytes can both pass the
//! lookup in step 1. The loser of the resulting insert race gets a
//! duplicate-content error from the store and resolves it by adopting
//! the winner's document, so both callers observe the same outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use docvault_core::chunk::Chunker;
use docvault_core::embedding::EmbeddingProvider;
use docvault_core::error::{EmbedError, LoaderError, StoreError};
use docvault_core::fingerprint::ContentHash;
use docvault_core::loader::DocumentLoader;
use docvault_core::models::{DocId, DocumentMeta, VectorId};
use docvault_core::store::Store;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embedding(#[from] EmbedError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("deadline expired during {0}")]
    DeadlineExpired(&'static str),
}

/// Caller-supplied description of the source being ingested.
#[derive(Debug, Clone)]
pub struct IngestMeta {
    pub source_path: String,
    pub display_name: String,
    pub extension: Option<String>,
}

/// Per-call knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    /// Applied separately to the embedding stage and the persistence
    /// stage; `None` means no limit.
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub doc_id: DocId,
    /// True when the content hash was already present and no new
    /// document was created.
    pub deduplicated: bool,
    pub vector_ids: Vec<VectorId>,
}

pub struct IngestionCoordinator {
    store: Arc<dyn Store>,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        loader: Arc<dyn DocumentLoader>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            loader,
            chunker,
            embedder,
        }
    }

    /// Run the full pipeline over one document's raw bytes.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        meta: IngestMeta,
        options: IngestOptions,
    ) -> Result<IngestOutcome, IngestError> {
        let content_hash = ContentHash::of(bytes);
        debug!(%content_hash, source = %meta.source_path, "fingerprinted document");

        if let Some(existing) = self.store.find_by_hash(&content_hash).await? {
            return self.adopt_existing(existing).await;
        }

        let blocks = self.loader.load(bytes)?;
        let text = blocks.join("\n\n");
        let chunks = self.chunker.split(
            &text,
            options.chunk_size as usize,
            options.chunk_overlap as usize,
        );
        debug!(chunks = chunks.len(), "chunked document");

        let embeddings = with_deadline(
            options.deadline,
            "embedding",
            self.embedder.embed(&chunks),
        )
        .await??;

        if embeddings.len() != chunks.len() {
            return Err(IngestError::Embedding(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            ))));
        }

        let doc_meta = DocumentMeta {
            content_hash: content_hash.clone(),
            source_path: meta.source_path,
            display_name: meta.display_name,
            byte_size: bytes.len() as i64,
            extension: meta.extension,
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
        };

        let persisted = with_deadline(
            options.deadline,
            "persistence",
            self.store.persist_ingestion(&doc_meta, &embeddings),
        )
        .await?;

        match persisted {
            Ok((doc_id, vector_ids)) => {
                info!(%doc_id, vectors = vector_ids.len(), "ingested document");
                Ok(IngestOutcome {
                    doc_id,
                    deduplicated: false,
                    vector_ids,
                })
            }
            // Lost an insert race against an identical document.
            Err(StoreError::DuplicateContent { .. }) => {
                let winner = self
                    .store
                    .find_by_hash(&content_hash)
                    .await?
                    .ok_or_else(|| {
                        IngestError::Store(StoreError::DuplicateContent {
                            content_hash: content_hash.to_string(),
                        })
                    })?;
                self.adopt_existing(winner).await
            }
            Err(e) => Err(IngestError::Store(e)),
        }
    }

    async fn adopt_existing(&self, doc_id: DocId) -> Result<IngestOutcome, IngestError> {
        let document = self.store.get(&doc_id).await?;
        info!(%doc_id, "content already ingested, reusing document");
        Ok(IngestOutcome {
            doc_id,
            deduplicated: true,
            vector_ids: document.vector_ids,
        })
    }
}

async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<T, IngestError>
where
    F: Future<Output = T>,
{
    match deadline {
        None => Ok(fut.await),
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| IngestError::DeadlineExpired(stage)),
    }
}
