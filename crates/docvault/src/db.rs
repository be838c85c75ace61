//! SQLite storage adapter.
//!
//! [`Db`] owns the connection pool and the reconnect policy: before
//! handing the pool out it verifies liveness with a ping, and if the
//! backend dropped it performs exactly one reconnect attempt before
//! failing with [`StoreError::Connection`]. It never retries
//! indefinitely. There is no ambient global handle; the adapter is
//! constructed explicitly and injected into the store.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use docvault_core::error::{Result, StoreError};

pub struct Db {
    options: SqliteConnectOptions,
    pool: RwLock<SqlitePool>,
}

impl Db {
    /// Open (creating if missing) the database at `path`, in WAL mode
    /// with foreign keys enforced.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Connection(format!("cannot create {parent:?}: {e}")))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = Self::open_pool(&options).await?;
        debug!(path = %path.display(), "opened sqlite database");

        Ok(Self {
            options,
            pool: RwLock::new(pool),
        })
    }

    async fn open_pool(options: &SqliteConnectOptions) -> Result<SqlitePool> {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options.clone())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// A liveness-checked handle to the pool.
    ///
    /// Pings with `SELECT 1`; on failure, reconnects once and pings
    /// again. A second failure surfaces as [`StoreError::Connection`].
    pub async fn pool(&self) -> Result<SqlitePool> {
        let pool = self.pool.read().await.clone();
        if ping(&pool).await {
            return Ok(pool);
        }

        warn!("sqlite connection lost, attempting single reconnect");
        let mut guard = self.pool.write().await;
        // Another task may have already reconnected while we waited.
        if ping(&guard).await {
            return Ok(guard.clone());
        }

        let fresh = Self::open_pool(&self.options).await?;
        if !ping(&fresh).await {
            fresh.close().await;
            return Err(StoreError::Connection(
                "backend still unreachable after reconnect".to_string(),
            ));
        }
        // Release the dead pool's connections before installing the
        // replacement.
        let stale = std::mem::replace(&mut *guard, fresh.clone());
        stale.close().await;
        Ok(fresh)
    }

    pub async fn close(&self) {
        self.pool.read().await.close().await;
    }
}

async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
