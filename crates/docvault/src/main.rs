//! # DocVault CLI (`dv`)
//!
//! Command-line interface over the document vault: database
//! initialization, ingestion, document inspection, and similarity
//! search.
//!
//! ## Usage
//!
//! ```bash
//! dv --config ./config/dv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dv init` | Create the SQLite database and run schema migrations |
//! | `dv ingest <path>` | Fingerprint, chunk, embed, and store a file |
//! | `dv get <id>` | Print a document's metadata |
//! | `dv vectors <id>` | List a document's vector records |
//! | `dv content <id>` | Attach extracted text to a document |
//! | `dv search "<query>"` | Cosine-similarity search over stored vectors |
//! | `dv hash <path>` | Print a file's content fingerprint |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docvault::config::{self, Config};
use docvault::db::Db;
use docvault::embedding::create_provider;
use docvault::ingest::{IngestMeta, IngestOptions, IngestionCoordinator};
use docvault::migrate;
use docvault::retrieval::RetrievalEngine;
use docvault::store::SqliteStore;

use docvault_core::chunk::WindowChunker;
use docvault_core::fingerprint::ContentHash;
use docvault_core::loader::PlainTextLoader;
use docvault_core::models::DocId;
use docvault_core::store::{DocumentStore, VectorStore};

/// DocVault — a content-addressed document store with vector search.
#[derive(Parser)]
#[command(
    name = "dv",
    about = "DocVault — a content-addressed document store with vector search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and vectors
    /// tables. Running it again on an existing database is a no-op.
    Init,

    /// Ingest a file into the vault.
    ///
    /// Fingerprints the raw bytes first; content that is already
    /// stored is reported as a duplicate and nothing is written.
    Ingest {
        /// File to ingest.
        path: PathBuf,

        /// Override the configured chunk size (characters).
        #[arg(long)]
        chunk_size: Option<u32>,

        /// Override the configured chunk overlap (characters).
        #[arg(long)]
        chunk_overlap: Option<u32>,

        /// Display name stored with the document (defaults to the file name).
        #[arg(long)]
        display_name: Option<String>,

        /// Abort the embedding or persistence stage after this many seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Print a document's metadata by id.
    Get {
        /// Document UUID.
        id: String,
    },

    /// List a document's vector records.
    Vectors {
        /// Document UUID.
        id: String,
    },

    /// Attach extracted text to an existing document.
    Content {
        /// Document UUID.
        id: String,

        /// Text to store. Mutually exclusive with --file.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Similarity search over stored vectors.
    ///
    /// Embeds the query with the configured provider and ranks stored
    /// vectors by cosine similarity.
    Search {
        /// The query text.
        query: String,

        /// Restrict the search to one document.
        #[arg(long)]
        doc: Option<String>,

        /// Minimum similarity score (defaults to the configured threshold).
        #[arg(long)]
        threshold: Option<f32>,

        /// Maximum number of hits (defaults to the configured top_k).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print a file's content fingerprint without storing anything.
    Hash {
        /// File to fingerprint.
        path: PathBuf,
    },
}

async fn open_store(cfg: &Config) -> Result<Arc<SqliteStore>> {
    let db = Db::connect(&cfg.db.path).await?;
    migrate::run_migrations(&db).await?;
    Ok(Arc::new(SqliteStore::new(db)))
}

async fn run_ingest(
    cfg: &Config,
    path: PathBuf,
    chunk_size: Option<u32>,
    chunk_overlap: Option<u32>,
    display_name: Option<String>,
    deadline_secs: Option<u64>,
) -> Result<()> {
    let bytes = std::fs::read(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let store = open_store(cfg).await?;
    let embedder = create_provider(&cfg.embedding)?;

    let coordinator = IngestionCoordinator::new(
        store.clone(),
        Arc::new(PlainTextLoader),
        Arc::new(WindowChunker),
        embedder,
    );

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned());

    let meta = IngestMeta {
        source_path: path.display().to_string(),
        display_name: display_name.unwrap_or(file_name),
        extension,
    };
    let options = IngestOptions {
        chunk_size: chunk_size.unwrap_or(cfg.chunking.chunk_size),
        chunk_overlap: chunk_overlap.unwrap_or(cfg.chunking.chunk_overlap),
        deadline: deadline_secs.map(Duration::from_secs),
    };

    let outcome = coordinator.ingest(&bytes, meta, options).await?;
    if outcome.deduplicated {
        println!(
            "Content already stored as document {} ({} vectors).",
            outcome.doc_id,
            outcome.vector_ids.len()
        );
    } else {
        println!(
            "Ingested document {} with {} vectors.",
            outcome.doc_id,
            outcome.vector_ids.len()
        );
    }
    store.close().await;
    Ok(())
}

async fn run_get(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    let document = store.get(&DocId::from_string(id.to_string())).await?;

    println!("Document:     {}", document.doc_id);
    println!("Name:         {}", document.display_name);
    println!("Source:       {}", document.source_path);
    println!("Fingerprint:  {}", document.content_hash);
    println!("Size:         {} bytes", document.byte_size);
    if let Some(ext) = &document.extension {
        println!("Extension:    {}", ext);
    }
    println!(
        "Chunking:     size {} / overlap {}",
        document.chunk_size, document.chunk_overlap
    );
    println!("Vectors:      {}", document.vector_ids.len());
    match &document.content {
        Some(text) => println!("\n{}", text),
        None => println!("Content:      (not stored)"),
    }
    store.close().await;
    Ok(())
}

async fn run_vectors(cfg: &Config, id: &str) -> Result<()> {
    let store = open_store(cfg).await?;
    let records = store
        .get_for_document(&DocId::from_string(id.to_string()))
        .await?;

    if records.is_empty() {
        println!("No vectors stored for document {}.", id);
    }
    for record in &records {
        println!(
            "[{}] {} ({} dims, created {})",
            record.chunk_index,
            record.vector_id,
            record.embedding.len(),
            record.created_at.to_rfc3339()
        );
    }
    store.close().await;
    Ok(())
}

async fn run_content(
    cfg: &Config,
    id: &str,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let text = match (text, file) {
        (Some(t), None) => t,
        (None, Some(f)) => std::fs::read_to_string(&f)
            .with_context(|| format!("Failed to read {}", f.display()))?,
        _ => bail!("Provide exactly one of --text or --file"),
    };

    let store = open_store(cfg).await?;
    store
        .set_content(&DocId::from_string(id.to_string()), &text)
        .await?;
    println!("Stored content for document {}.", id);
    store.close().await;
    Ok(())
}

async fn run_search(
    cfg: &Config,
    query: &str,
    doc: Option<String>,
    threshold: Option<f32>,
    top_k: Option<usize>,
) -> Result<()> {
    if !cfg.embedding.is_enabled() {
        bail!("Search requires an embedding provider; set [embedding] in the config.");
    }

    let store = open_store(cfg).await?;
    let embedder = create_provider(&cfg.embedding)?;

    let mut embedded = embedder.embed(&[query.to_string()]).await?;
    let query_vec = match embedded.pop() {
        Some(v) => v,
        None => bail!("Embedding provider returned no vector for the query"),
    };

    let engine = RetrievalEngine::with_defaults(
        store.clone() as Arc<dyn VectorStore>,
        cfg.retrieval.threshold,
        cfg.retrieval.top_k,
    );

    let hits = match doc {
        Some(id) => {
            engine
                .search_document(&query_vec, DocId::from_string(id), threshold, top_k)
                .await?
        }
        None => engine.search_corpus(&query_vec, threshold, top_k).await?,
    };

    if hits.is_empty() {
        println!("No results above the similarity threshold.");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. score {:.4}  vector {}  document {}",
            rank + 1,
            hit.score,
            hit.vector_id,
            hit.doc_id
        );
    }
    store.close().await;
    Ok(())
}

fn run_hash(path: &PathBuf) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}", ContentHash::of(&bytes));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    // `dv hash` works without a config file.
    if let Commands::Hash { path } = &cli.command {
        return run_hash(path);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = open_store(&cfg).await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            chunk_size,
            chunk_overlap,
            display_name,
            deadline_secs,
        } => {
            run_ingest(&cfg, path, chunk_size, chunk_overlap, display_name, deadline_secs).await?;
        }
        Commands::Get { id } => {
            run_get(&cfg, &id).await?;
        }
        Commands::Vectors { id } => {
            run_vectors(&cfg, &id).await?;
        }
        Commands::Content { id, text, file } => {
            run_content(&cfg, &id, text, file).await?;
        }
        Commands::Search {
            query,
            doc,
            threshold,
            top_k,
        } => {
            run_search(&cfg, &query, doc, threshold, top_k).await?;
        }
        Commands::Hash { .. } => unreachable!(),
    }

    Ok(())
}
