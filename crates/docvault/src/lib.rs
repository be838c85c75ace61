//! # DocVault
//!
//! A content-addressed document store with a vector index. Documents
//! are deduplicated by a fingerprint of their raw bytes, persisted
//! together with their embedding vectors in a single transaction, and
//! queried through cosine-similarity retrieval.
//!
//! This crate wires the storage-agnostic core ([`docvault_core`]) to
//! SQLite persistence, a remote embedding provider, the ingestion
//! pipeline, and the `dv` command-line interface.
//!
//! ## Layout
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration loading and validation |
//! | [`db`] | SQLite connection management with reconnect |
//! | [`migrate`] | Schema creation (idempotent) |
//! | [`store`] | [`SqliteStore`](store::SqliteStore), the durable store |
//! | [`embedding`] | OpenAI and disabled embedding providers |
//! | [`ingest`] | The fingerprint → dedup → chunk → embed → persist pipeline |
//! | [`retrieval`] | Similarity search with configured defaults |

pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod retrieval;
pub mod store;
