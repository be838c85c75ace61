//! SQLite-backed [`Store`] implementation.
//!
//! Maps each store operation onto the `documents` and `vectors`
//! tables. Uniqueness is enforced by the schema constraints, not by
//! prior lookups: a racing duplicate insert fails at the database and
//! is translated to [`StoreError::DuplicateContent`], which is how
//! two concurrent ingestions of identical content converge on one
//! row.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use docvault_core::error::{Result, StoreError};
use docvault_core::fingerprint::ContentHash;
use docvault_core::models::{
    DocId, Document, DocumentMeta, SearchHit, SearchScope, VectorId, VectorRecord,
};
use docvault_core::similarity::{blob_to_vec, rank, vec_to_blob, Candidate};
use docvault_core::store::{DocumentStore, Store, VectorStore};

use crate::db::Db;

/// SQLite implementation of the store trait pair.
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn pool(&self) -> Result<SqlitePool> {
        self.db.pool().await
    }
}

/// Map a sqlx failure during the atomic persistence step.
pub(crate) fn tx_err(err: sqlx::Error) -> StoreError {
    StoreError::Transaction(err.to_string())
}

/// Map a sqlx failure on the read path.
fn read_err(err: sqlx::Error) -> StoreError {
    StoreError::Connection(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn encode_vector_ids(vector_ids: &[VectorId]) -> Result<String> {
    serde_json::to_string(vector_ids)
        .map_err(|e| StoreError::Transaction(format!("cannot encode vector_ids: {e}")))
}

fn decode_vector_ids(raw: Option<String>) -> Result<Vec<VectorId>> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) => serde_json::from_str(&s)
            .map_err(|e| StoreError::Transaction(format!("corrupt vector_ids column: {e}"))),
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let hash: String = row.get("content_hash");
    let content_hash = ContentHash::parse(&hash)
        .ok_or_else(|| StoreError::Transaction(format!("corrupt content_hash column: {hash}")))?;
    Ok(Document {
        doc_id: DocId::from_string(row.get("doc_id")),
        content_hash,
        source_path: row.get("source_path"),
        display_name: row.get("display_name"),
        byte_size: row.get("byte_size"),
        extension: row.get("extension"),
        chunk_size: row.get::<i64, _>("chunk_size") as u32,
        chunk_overlap: row.get::<i64, _>("chunk_overlap") as u32,
        content: row.get("content"),
        vector_ids: decode_vector_ids(row.get("vector_ids"))?,
    })
}

const INSERT_DOCUMENT: &str = r#"
    INSERT INTO documents (doc_id, source_path, display_name, byte_size,
                           content_hash, extension, chunk_size, chunk_overlap)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_VECTOR: &str = r#"
    INSERT INTO vectors (vector_id, doc_id, chunk_index, embedding, created_at)
    VALUES (?, ?, ?, ?, ?)
"#;

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<DocId>> {
        let pool = self.pool().await?;
        let id: Option<String> =
            sqlx::query_scalar("SELECT doc_id FROM documents WHERE content_hash = ?")
                .bind(hash.as_str())
                .fetch_optional(&pool)
                .await
                .map_err(read_err)?;
        Ok(id.map(DocId::from_string))
    }

    async fn insert(&self, meta: &DocumentMeta) -> Result<DocId> {
        let pool = self.pool().await?;
        let doc_id = DocId::new();

        let result = sqlx::query(INSERT_DOCUMENT)
            .bind(doc_id.as_str())
            .bind(&meta.source_path)
            .bind(&meta.display_name)
            .bind(meta.byte_size)
            .bind(meta.content_hash.as_str())
            .bind(&meta.extension)
            .bind(meta.chunk_size as i64)
            .bind(meta.chunk_overlap as i64)
            .execute(&pool)
            .await;

        match result {
            Ok(_) => Ok(doc_id),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateContent {
                content_hash: meta.content_hash.to_string(),
            }),
            Err(e) => Err(tx_err(e)),
        }
    }

    async fn set_vector_ids(&self, doc_id: &DocId, vector_ids: &[VectorId]) -> Result<()> {
        let pool = self.pool().await?;
        let encoded = encode_vector_ids(vector_ids)?;
        let result = sqlx::query("UPDATE documents SET vector_ids = ? WHERE doc_id = ?")
            .bind(&encoded)
            .bind(doc_id.as_str())
            .execute(&pool)
            .await
            .map_err(tx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }
        Ok(())
    }

    async fn set_content(&self, doc_id: &DocId, text: &str) -> Result<()> {
        let pool = self.pool().await?;
        let result = sqlx::query("UPDATE documents SET content = ? WHERE doc_id = ?")
            .bind(text)
            .bind(doc_id.as_str())
            .execute(&pool)
            .await
            .map_err(tx_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }
        Ok(())
    }

    async fn get(&self, doc_id: &DocId) -> Result<Document> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT doc_id, source_path, display_name, byte_size, content_hash, extension, \
             chunk_size, chunk_overlap, content, vector_ids FROM documents WHERE doc_id = ?",
        )
        .bind(doc_id.as_str())
        .fetch_optional(&pool)
        .await
        .map_err(read_err)?;

        match row {
            Some(row) => document_from_row(&row),
            None => Err(StoreError::NotFound(doc_id.to_string())),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert_batch(
        &self,
        doc_id: &DocId,
        batch: &[(u32, Vec<f32>)],
    ) -> Result<Vec<VectorId>> {
        let mut seen = HashSet::new();
        for (idx, _) in batch {
            if !seen.insert(*idx) {
                return Err(StoreError::InvalidBatch(format!(
                    "chunk index {idx} repeated within batch"
                )));
            }
        }

        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(tx_err)?;
        let now = Utc::now().timestamp();
        let mut vector_ids = Vec::with_capacity(batch.len());

        for (idx, embedding) in batch {
            let vector_id = VectorId::new();
            let result = sqlx::query(INSERT_VECTOR)
                .bind(vector_id.as_str())
                .bind(doc_id.as_str())
                .bind(*idx as i64)
                .bind(vec_to_blob(embedding))
                .bind(now)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(_) => vector_ids.push(vector_id),
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::InvalidBatch(format!(
                        "chunk index {idx} already stored for document {doc_id}"
                    )));
                }
                Err(e) if is_foreign_key_violation(&e) => {
                    return Err(StoreError::NotFound(doc_id.to_string()));
                }
                Err(e) => return Err(tx_err(e)),
            }
        }

        tx.commit().await.map_err(tx_err)?;
        Ok(vector_ids)
    }

    async fn get_for_document(&self, doc_id: &DocId) -> Result<Vec<VectorRecord>> {
        let pool = self.pool().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM documents WHERE doc_id = ?")
            .bind(doc_id.as_str())
            .fetch_optional(&pool)
            .await
            .map_err(read_err)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }

        let rows = sqlx::query(
            "SELECT vector_id, doc_id, chunk_index, embedding, created_at \
             FROM vectors WHERE doc_id = ? ORDER BY chunk_index ASC",
        )
        .bind(doc_id.as_str())
        .fetch_all(&pool)
        .await
        .map_err(read_err)?;

        let records = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let ts: i64 = row.get("created_at");
                VectorRecord {
                    vector_id: VectorId::from_string(row.get("vector_id")),
                    doc_id: DocId::from_string(row.get("doc_id")),
                    chunk_index: row.get::<i64, _>("chunk_index") as u32,
                    embedding: blob_to_vec(&blob),
                    created_at: chrono::DateTime::from_timestamp(ts, 0)
                        .unwrap_or(chrono::DateTime::UNIX_EPOCH),
                }
            })
            .collect();

        Ok(records)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        scope: SearchScope,
        threshold: f32,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let pool = self.pool().await?;

        let rows = match &scope {
            SearchScope::Corpus => {
                sqlx::query("SELECT vector_id, doc_id, embedding FROM vectors")
                    .fetch_all(&pool)
                    .await
            }
            SearchScope::Document(doc_id) => {
                sqlx::query("SELECT vector_id, doc_id, embedding FROM vectors WHERE doc_id = ?")
                    .bind(doc_id.as_str())
                    .fetch_all(&pool)
                    .await
            }
        }
        .map_err(read_err)?;

        let candidates: Vec<Candidate> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Candidate {
                    vector_id: VectorId::from_string(row.get("vector_id")),
                    doc_id: DocId::from_string(row.get("doc_id")),
                    embedding: blob_to_vec(&blob),
                }
            })
            .collect();

        debug!(candidates = candidates.len(), "scoring similarity candidates");
        rank(query, candidates, threshold, top_k)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn persist_ingestion(
        &self,
        meta: &DocumentMeta,
        embeddings: &[Vec<f32>],
    ) -> Result<(DocId, Vec<VectorId>)> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(tx_err)?;

        let doc_id = DocId::new();
        let inserted = sqlx::query(INSERT_DOCUMENT)
            .bind(doc_id.as_str())
            .bind(&meta.source_path)
            .bind(&meta.display_name)
            .bind(meta.byte_size)
            .bind(meta.content_hash.as_str())
            .bind(&meta.extension)
            .bind(meta.chunk_size as i64)
            .bind(meta.chunk_overlap as i64)
            .execute(&mut *tx)
            .await;

        // A racing ingestion of the same content may have won between
        // the dedup lookup and this insert; the dropped transaction
        // rolls back and the caller adopts the winner's row.
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::DuplicateContent {
                    content_hash: meta.content_hash.to_string(),
                });
            }
            Err(e) => return Err(tx_err(e)),
        }

        let now = Utc::now().timestamp();
        let mut vector_ids = Vec::with_capacity(embeddings.len());
        for (idx, embedding) in embeddings.iter().enumerate() {
            let vector_id = VectorId::new();
            sqlx::query(INSERT_VECTOR)
                .bind(vector_id.as_str())
                .bind(doc_id.as_str())
                .bind(idx as i64)
                .bind(vec_to_blob(embedding))
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(tx_err)?;
            vector_ids.push(vector_id);
        }

        let encoded = encode_vector_ids(&vector_ids)?;
        sqlx::query("UPDATE documents SET vector_ids = ? WHERE doc_id = ?")
            .bind(&encoded)
            .bind(doc_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(tx_err)?;

        tx.commit().await.map_err(tx_err)?;
        debug!(%doc_id, vectors = vector_ids.len(), "persisted document and vector batch");
        Ok((doc_id, vector_ids))
    }
}
