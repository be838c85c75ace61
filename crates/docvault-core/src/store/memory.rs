//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind a single `std::sync::RwLock`, so
//! every multi-row operation is naturally atomic: the write lock is
//! held for the whole mutation and validation happens before any
//! state changes. Similarity search is brute-force cosine over all
//! stored vectors.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Result, StoreError};
use crate::fingerprint::ContentHash;
use crate::models::{
    DocId, Document, DocumentMeta, SearchHit, SearchScope, VectorId, VectorRecord,
};
use crate::similarity::{rank, Candidate};

use super::{DocumentStore, Store, VectorStore};

#[derive(Default)]
struct Inner {
    docs: HashMap<DocId, Document>,
    by_hash: HashMap<ContentHash, DocId>,
    vectors: Vec<VectorRecord>,
}

/// In-memory store, the reference implementation of the storage
/// invariants.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of document rows currently stored. Test helper.
    pub fn document_count(&self) -> usize {
        self.inner.read().unwrap().docs.len()
    }

    /// Number of vector rows currently stored. Test helper.
    pub fn vector_count(&self) -> usize {
        self.inner.read().unwrap().vectors.len()
    }
}

fn new_document(doc_id: DocId, meta: &DocumentMeta) -> Document {
    Document {
        doc_id,
        content_hash: meta.content_hash.clone(),
        source_path: meta.source_path.clone(),
        display_name: meta.display_name.clone(),
        byte_size: meta.byte_size,
        extension: meta.extension.clone(),
        chunk_size: meta.chunk_size,
        chunk_overlap: meta.chunk_overlap,
        content: None,
        vector_ids: Vec::new(),
    }
}

fn validate_batch(inner: &Inner, doc_id: &DocId, indices: &[u32]) -> Result<()> {
    let mut seen = HashSet::new();
    for idx in indices {
        if !seen.insert(*idx) {
            return Err(StoreError::InvalidBatch(format!(
                "chunk index {idx} repeated within batch"
            )));
        }
        if inner
            .vectors
            .iter()
            .any(|v| &v.doc_id == doc_id && v.chunk_index == *idx)
        {
            return Err(StoreError::InvalidBatch(format!(
                "chunk index {idx} already stored for document {doc_id}"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<DocId>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.by_hash.get(hash).cloned())
    }

    async fn insert(&self, meta: &DocumentMeta) -> Result<DocId> {
        let mut inner = self.inner.write().unwrap();
        if inner.by_hash.contains_key(&meta.content_hash) {
            return Err(StoreError::DuplicateContent {
                content_hash: meta.content_hash.to_string(),
            });
        }
        let doc_id = DocId::new();
        inner
            .by_hash
            .insert(meta.content_hash.clone(), doc_id.clone());
        inner
            .docs
            .insert(doc_id.clone(), new_document(doc_id.clone(), meta));
        Ok(doc_id)
    }

    async fn set_vector_ids(&self, doc_id: &DocId, vector_ids: &[VectorId]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let doc = inner
            .docs
            .get_mut(doc_id)
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;
        doc.vector_ids = vector_ids.to_vec();
        Ok(())
    }

    async fn set_content(&self, doc_id: &DocId, text: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let doc = inner
            .docs
            .get_mut(doc_id)
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;
        doc.content = Some(text.to_string());
        Ok(())
    }

    async fn get(&self, doc_id: &DocId) -> Result<Document> {
        let inner = self.inner.read().unwrap();
        inner
            .docs
            .get(doc_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(doc_id.to_string()))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert_batch(
        &self,
        doc_id: &DocId,
        batch: &[(u32, Vec<f32>)],
    ) -> Result<Vec<VectorId>> {
        let mut inner = self.inner.write().unwrap();
        if !inner.docs.contains_key(doc_id) {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }
        let indices: Vec<u32> = batch.iter().map(|(idx, _)| *idx).collect();
        validate_batch(&inner, doc_id, &indices)?;

        let now = Utc::now();
        let mut vector_ids = Vec::with_capacity(batch.len());
        for (idx, embedding) in batch {
            let vector_id = VectorId::new();
            inner.vectors.push(VectorRecord {
                vector_id: vector_id.clone(),
                doc_id: doc_id.clone(),
                chunk_index: *idx,
                embedding: embedding.clone(),
                created_at: now,
            });
            vector_ids.push(vector_id);
        }
        Ok(vector_ids)
    }

    async fn get_for_document(&self, doc_id: &DocId) -> Result<Vec<VectorRecord>> {
        let inner = self.inner.read().unwrap();
        if !inner.docs.contains_key(doc_id) {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }
        let mut records: Vec<VectorRecord> = inner
            .vectors
            .iter()
            .filter(|v| &v.doc_id == doc_id)
            .cloned()
            .collect();
        records.sort_by_key(|v| v.chunk_index);
        Ok(records)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        scope: SearchScope,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read().unwrap();
        let candidates: Vec<Candidate> = inner
            .vectors
            .iter()
            .filter(|v| match &scope {
                SearchScope::Corpus => true,
                SearchScope::Document(doc_id) => &v.doc_id == doc_id,
            })
            .map(|v| Candidate {
                vector_id: v.vector_id.clone(),
                doc_id: v.doc_id.clone(),
                embedding: v.embedding.clone(),
            })
            .collect();
        rank(query, candidates, threshold, top_k)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn persist_ingestion(
        &self,
        meta: &DocumentMeta,
        embeddings: &[Vec<f32>],
    ) -> Result<(DocId, Vec<VectorId>)> {
        // One write lock across validation and every mutation: either
        // the document, its vectors, and the id backfill all land, or
        // nothing does.
        let mut inner = self.inner.write().unwrap();
        if inner.by_hash.contains_key(&meta.content_hash) {
            return Err(StoreError::DuplicateContent {
                content_hash: meta.content_hash.to_string(),
            });
        }

        let doc_id = DocId::new();
        let now = Utc::now();
        let mut vector_ids = Vec::with_capacity(embeddings.len());
        let mut records = Vec::with_capacity(embeddings.len());
        for (idx, embedding) in embeddings.iter().enumerate() {
            let vector_id = VectorId::new();
            records.push(VectorRecord {
                vector_id: vector_id.clone(),
                doc_id: doc_id.clone(),
                chunk_index: idx as u32,
                embedding: embedding.clone(),
                created_at: now,
            });
            vector_ids.push(vector_id);
        }

        let mut doc = new_document(doc_id.clone(), meta);
        doc.vector_ids = vector_ids.clone();

        inner
            .by_hash
            .insert(meta.content_hash.clone(), doc_id.clone());
        inner.docs.insert(doc_id.clone(), doc);
        inner.vectors.extend(records);

        Ok((doc_id, vector_ids))
    }
}
