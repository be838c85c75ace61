//! # DocVault Core
//!
//! Backend-agnostic core for DocVault: data models, content
//! fingerprinting, the error taxonomy, chunking and loader seams,
//! cosine-similarity ranking, and the store trait pair.
//!
//! This crate contains no tokio runtime, sqlx, or network I/O; the
//! SQLite backend, embedding providers, and the ingestion
//! coordinator live in the `docvault` crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod loader;
pub mod models;
pub mod similarity;
pub mod store;

pub use error::{EmbedError, LoaderError, Result, StoreError};
pub use fingerprint::ContentHash;
pub use models::{DocId, Document, DocumentMeta, SearchHit, SearchScope, VectorId, VectorRecord};
