//! Schema migrations.
//!
//! Creates the two tables of the logical schema. Idempotent: every
//! statement is `IF NOT EXISTS`, so `dv init` can run any number of
//! times.
//!
//! The `documents.content_hash` UNIQUE constraint is the dedup
//! contract, and `vectors(doc_id, chunk_index)` UNIQUE is the batch
//! invariant; both are enforced here, at the storage layer, so they
//! hold under concurrent writers regardless of what callers check
//! first.

use docvault_core::error::Result;

use crate::db::Db;
use crate::store::tx_err;

pub async fn run_migrations(db: &Db) -> Result<()> {
    let pool = db.pool().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            doc_id TEXT PRIMARY KEY,
            source_path TEXT NOT NULL,
            display_name TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            extension TEXT,
            chunk_size INTEGER NOT NULL,
            chunk_overlap INTEGER NOT NULL,
            content TEXT,
            vector_ids TEXT
        )
        "#,
    )
    .execute(&pool)
    .await
    .map_err(tx_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            vector_id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(doc_id, chunk_index),
            FOREIGN KEY (doc_id) REFERENCES documents(doc_id)
        )
        "#,
    )
    .execute(&pool)
    .await
    .map_err(tx_err)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_doc_id ON vectors(doc_id)")
        .execute(&pool)
        .await
        .map_err(tx_err)?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash)")
        .execute(&pool)
        .await
        .map_err(tx_err)?;

    Ok(())
}
