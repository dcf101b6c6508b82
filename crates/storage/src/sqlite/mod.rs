//! Local `SQLite` store for the signed-in portal session.
//!
//! The client keeps one row: the bearer token and who it belongs to. Everything
//! else lives on the backend.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::repository::{AuthSessionRepository, Storage};

mod auth_session_repo;
mod mapping;
mod migrate;

/// A CLI run touches the session row a handful of times.
const MAX_CONNECTIONS: u32 = 2;
/// Another `portal` process may hold the write lock while it saves a login.
const BUSY_TIMEOUT: &str = "PRAGMA busy_timeout = 5000;";

/// Session store backed by a `SQLite` file (or a shared in-memory database in tests).
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("cannot open session database: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the session database at `database_url`, creating the file on first use.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed, the file cannot be
    /// opened, or a connection pragma fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(BUSY_TIMEOUT).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema versions (`auth_session` and the version table).
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open and migrate the session database, then expose it as the session repository.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let auth_sessions: Arc<dyn AuthSessionRepository> = Arc::new(repo);
        Ok(Self { auth_sessions })
    }
}
