//! SQLite connection factory, migration runner and pagination helpers.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

pub mod migrate;
pub mod paginate;

pub use migrate::Migration;
pub use paginate::{paginate, Direction, Entity, Filter, Page, QueryOptions, SortBy, SortKey};

/// Errors raised by the storage layer.
#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("cannot sort by '{0}'")]
    UnknownSortField(String),

    #[error("migration '{module}/{id}' failed: {source}")]
    Migration {
        module: String,
        id: String,
        #[source]
        source: sqlx::Error,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Handle to the application database.
///
/// Cheap to clone; every clone shares the same pool. Construct it once at
/// bootstrap and hand it to whoever needs storage.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for `url`, creating the database file when missing.
    ///
    /// In-memory URLs are pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` sees its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?
        };

        tracing::info!(target: "bookshelf-db", %url, "database pool ready");
        Ok(Self { pool })
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> DbResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration that has not run yet. Returns how many ran.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> DbResult<usize> {
        migrate::apply(&self.pool, migrations).await
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "bookshelf-db", "database pool closed");
    }
}
