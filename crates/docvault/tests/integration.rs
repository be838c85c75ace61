//! End-to-end tests over the SQLite store and the ingestion pipeline.
//!
//! Uses a stub embedding provider so no network access is required:
//! vectors are derived deterministically from the chunk text, which
//! makes similarity results predictable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use docvault::db::Db;
use docvault::ingest::{IngestError, IngestMeta, IngestOptions, IngestionCoordinator};
use docvault::migrate;
use docvault::retrieval::RetrievalEngine;
use docvault::store::SqliteStore;

use docvault_core::chunk::WindowChunker;
use docvault_core::embedding::EmbeddingProvider;
use docvault_core::error::{EmbedError, StoreError};
use docvault_core::fingerprint::ContentHash;
use docvault_core::loader::PlainTextLoader;
use docvault_core::models::{DocId, DocumentMeta, SearchScope};
use docvault_core::store::{DocumentStore, VectorStore};

const DIMS: usize = 8;

// ─── Stub Providers ─────────────────────────────────────────────────

/// Derives a unit-norm vector from the chunk text, so identical text
/// always embeds to the same vector.
struct StubEmbedder;

fn stub_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for (i, b) in text.bytes().enumerate() {
        v[i % DIMS] += b as f32;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| stub_vector(t)).collect())
    }
}

/// Fails every call, as a provider outage would.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Provider("provider unavailable".into()))
    }
}

/// Takes longer than any test deadline allows.
struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|t| stub_vector(t)).collect())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

async fn test_store(tmp: &TempDir) -> Arc<SqliteStore> {
    let db = Db::connect(&tmp.path().join("vault.db")).await.unwrap();
    migrate::run_migrations(&db).await.unwrap();
    Arc::new(SqliteStore::new(db))
}

fn coordinator(
    store: Arc<SqliteStore>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> IngestionCoordinator {
    IngestionCoordinator::new(
        store,
        Arc::new(PlainTextLoader),
        Arc::new(WindowChunker),
        embedder,
    )
}

fn meta(name: &str) -> IngestMeta {
    IngestMeta {
        source_path: PathBuf::from("/docs").join(name).display().to_string(),
        display_name: name.to_string(),
        extension: Some("txt".to_string()),
    }
}

fn options(chunk_size: u32, chunk_overlap: u32) -> IngestOptions {
    IngestOptions {
        chunk_size,
        chunk_overlap,
        deadline: None,
    }
}

fn doc_meta(hash: &ContentHash, name: &str) -> DocumentMeta {
    DocumentMeta {
        content_hash: hash.clone(),
        source_path: format!("/docs/{name}"),
        display_name: name.to_string(),
        byte_size: 42,
        extension: Some("txt".to_string()),
        chunk_size: 500,
        chunk_overlap: 50,
    }
}

// ─── Ingestion Pipeline ─────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_persists_document_and_vectors() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    // 2400 chars with a 1500-char window and no overlap: two chunks.
    let bytes = vec![b'a'; 2400];
    let outcome = pipeline
        .ingest(&bytes, meta("big.txt"), options(1500, 0))
        .await
        .unwrap();

    assert!(!outcome.deduplicated);
    assert_eq!(outcome.vector_ids.len(), 2);

    let document = store.get(&outcome.doc_id).await.unwrap();
    assert_eq!(document.byte_size, 2400);
    assert_eq!(document.content_hash, ContentHash::of(&bytes));
    assert_eq!(document.vector_ids, outcome.vector_ids);

    let records = store.get_for_document(&outcome.doc_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].chunk_index, 0);
    assert_eq!(records[1].chunk_index, 1);
    assert_eq!(records[0].embedding.len(), DIMS);
}

#[tokio::test]
async fn test_reingest_identical_bytes_dedups() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    let bytes = b"the same report, twice".to_vec();
    let first = pipeline
        .ingest(&bytes, meta("report.txt"), options(500, 50))
        .await
        .unwrap();
    let second = pipeline
        .ingest(&bytes, meta("report-copy.txt"), options(500, 50))
        .await
        .unwrap();

    assert!(!first.deduplicated);
    assert!(second.deduplicated);
    assert_eq!(first.doc_id, second.doc_id);
    assert_eq!(first.vector_ids, second.vector_ids);

    // Still exactly one vector set.
    let records = store.get_for_document(&first.doc_id).await.unwrap();
    assert_eq!(records.len(), first.vector_ids.len());
}

#[tokio::test]
async fn test_concurrent_identical_ingest_converges() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = Arc::new(coordinator(store.clone(), Arc::new(StubEmbedder)));

    let bytes = b"raced content".to_vec();
    let (a, b) = tokio::join!(
        pipeline.ingest(&bytes, meta("a.txt"), options(500, 50)),
        pipeline.ingest(&bytes, meta("b.txt"), options(500, 50)),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.doc_id, b.doc_id);
    assert_eq!(a.vector_ids, b.vector_ids);
}

#[tokio::test]
async fn test_failed_embedding_leaves_store_untouched() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(FailingEmbedder));

    let bytes = b"will not make it".to_vec();
    let err = pipeline
        .ingest(&bytes, meta("doomed.txt"), options(500, 50))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Embedding(_)));

    // Nothing was written, so a later ingest succeeds cleanly.
    let hash = ContentHash::of(&bytes);
    assert!(store.find_by_hash(&hash).await.unwrap().is_none());

    let retry = coordinator(store.clone(), Arc::new(StubEmbedder));
    let outcome = retry
        .ingest(&bytes, meta("doomed.txt"), options(500, 50))
        .await
        .unwrap();
    assert!(!outcome.deduplicated);
}

#[tokio::test]
async fn test_deadline_expiry_aborts_cleanly() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(SlowEmbedder));

    let bytes = b"too slow".to_vec();
    let opts = IngestOptions {
        chunk_size: 500,
        chunk_overlap: 50,
        deadline: Some(Duration::from_millis(20)),
    };
    let err = pipeline
        .ingest(&bytes, meta("slow.txt"), opts)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::DeadlineExpired("embedding")));

    let hash = ContentHash::of(&bytes);
    assert!(store.find_by_hash(&hash).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_file_ingests_with_no_vectors() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    let outcome = pipeline
        .ingest(&[], meta("empty.txt"), options(500, 50))
        .await
        .unwrap();

    assert!(!outcome.deduplicated);
    assert!(outcome.vector_ids.is_empty());
    let document = store.get(&outcome.doc_id).await.unwrap();
    assert_eq!(document.byte_size, 0);
    assert!(document.vector_ids.is_empty());
}

// ─── Store Semantics ────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_insert_rejected_at_store() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let hash = ContentHash::of(b"unique bytes");
    store.insert(&doc_meta(&hash, "one.txt")).await.unwrap();
    let err = store.insert(&doc_meta(&hash, "two.txt")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateContent { .. }));
}

#[tokio::test]
async fn test_insert_batch_rejects_repeated_chunk_index() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let hash = ContentHash::of(b"batch doc");
    let doc_id = store.insert(&doc_meta(&hash, "batch.txt")).await.unwrap();

    let batch = vec![(0u32, vec![1.0; DIMS]), (0u32, vec![2.0; DIMS])];
    let err = store.insert_batch(&doc_id, &batch).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidBatch(_)));

    // The rejected batch left nothing behind.
    let records = store.get_for_document(&doc_id).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_insert_batch_collision_rolls_back_earlier_rows() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let hash = ContentHash::of(b"partial batch doc");
    let doc_id = store.insert(&doc_meta(&hash, "partial.txt")).await.unwrap();
    store
        .insert_batch(&doc_id, &[(0, vec![1.0; DIMS])])
        .await
        .unwrap();

    // Chunk 3 inserts fine inside the transaction before chunk 0
    // collides with the stored row; the whole batch must roll back,
    // taking the already-inserted chunk 3 with it.
    let batch = vec![(3u32, vec![2.0; DIMS]), (0u32, vec![3.0; DIMS])];
    let err = store.insert_batch(&doc_id, &batch).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidBatch(_)));

    let records = store.get_for_document(&doc_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chunk_index, 0);
    assert_eq!(records[0].embedding, vec![1.0; DIMS]);
}

#[tokio::test]
async fn test_persist_failure_rolls_back_document_row() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vault.db");
    let admin = Db::connect(&path).await.unwrap();
    migrate::run_migrations(&admin).await.unwrap();

    let store = Arc::new(SqliteStore::new(Db::connect(&path).await.unwrap()));
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    // Sabotage the vector table so the batch insert fails after the
    // document row has gone into the open transaction.
    sqlx::query("DROP TABLE vectors")
        .execute(&admin.pool().await.unwrap())
        .await
        .unwrap();

    let bytes = b"rolled back with the batch".to_vec();
    let err = pipeline
        .ingest(&bytes, meta("doomed-batch.txt"), options(500, 50))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::Store(StoreError::Transaction(_))
    ));

    // Full rollback: no document row survived the failed batch.
    let hash = ContentHash::of(&bytes);
    assert!(store.find_by_hash(&hash).await.unwrap().is_none());

    // With the schema restored, the same bytes ingest cleanly.
    migrate::run_migrations(&admin).await.unwrap();
    let outcome = pipeline
        .ingest(&bytes, meta("doomed-batch.txt"), options(500, 50))
        .await
        .unwrap();
    assert!(!outcome.deduplicated);
    assert_eq!(outcome.vector_ids.len(), 1);
}

#[tokio::test]
async fn test_insert_batch_unknown_document() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let batch = vec![(0u32, vec![1.0; DIMS])];
    let err = store.insert_batch(&DocId::new(), &batch).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_get_unknown_document_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let err = store.get(&DocId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    let err = store.get_for_document(&DocId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_set_content_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let hash = ContentHash::of(b"content doc");
    let doc_id = store.insert(&doc_meta(&hash, "notes.txt")).await.unwrap();

    store.set_content(&doc_id, "extracted text").await.unwrap();
    store.set_content(&doc_id, "extracted text").await.unwrap();

    let document = store.get(&doc_id).await.unwrap();
    assert_eq!(document.content.as_deref(), Some("extracted text"));

    let err = store
        .set_content(&DocId::new(), "orphan text")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_reconnect_replaces_and_closes_stale_pool() {
    let tmp = TempDir::new().unwrap();
    let db = Db::connect(&tmp.path().join("vault.db")).await.unwrap();

    let stale = db.pool().await.unwrap();
    stale.close().await;

    // The dead pool is detected, swapped out, and left closed.
    let fresh = db.pool().await.unwrap();
    assert!(!fresh.is_closed());
    assert!(stale.is_closed());
    sqlx::query("SELECT 1").execute(&fresh).await.unwrap();
}

// ─── Retrieval ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_ranks_self_match_first() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    let bytes = b"alpha section\n\nbeta section".to_vec();
    let outcome = pipeline
        .ingest(&bytes, meta("sections.txt"), options(14, 0))
        .await
        .unwrap();
    assert!(outcome.vector_ids.len() >= 2);

    let records = store.get_for_document(&outcome.doc_id).await.unwrap();
    let target = &records[0];

    let engine = RetrievalEngine::new(store.clone() as Arc<dyn VectorStore>);
    let hits = engine
        .search_corpus(&target.embedding, Some(0.5), Some(3))
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].vector_id, target.vector_id);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_search_scoped_to_document() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    let first = pipeline
        .ingest(b"first corpus entry", meta("first.txt"), options(500, 50))
        .await
        .unwrap();
    let second = pipeline
        .ingest(b"second corpus entry", meta("second.txt"), options(500, 50))
        .await
        .unwrap();

    let query = stub_vector("second corpus entry");
    let hits = store
        .similarity_search(&query, SearchScope::Document(first.doc_id.clone()), -1.0, 10)
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.doc_id == first.doc_id));
    assert!(hits.iter().all(|h| h.doc_id != second.doc_id));
}

#[tokio::test]
async fn test_zero_query_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let pipeline = coordinator(store.clone(), Arc::new(StubEmbedder));

    pipeline
        .ingest(b"some content", meta("any.txt"), options(500, 50))
        .await
        .unwrap();

    let err = store
        .similarity_search(&vec![0.0; DIMS], SearchScope::Corpus, 0.8, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ZeroNormQuery));
}
