//! Database connection handling for Tootbox
//!
//! One SQLite database holds all durable state: the outbox queue and
//! the per-user settings. Higher-level access goes through
//! [`crate::outbox::Outbox`] and [`crate::settings::SettingsStore`].

use sqlx::sqlite;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use crate::error::{DbError, Result};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the database at the given path
    /// and run pending migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on all platforms;
        // mode=rwc creates the file if it does not exist.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Open an in-memory database, used by tests.
    ///
    /// The pool is pinned to a single connection: every pooled
    /// connection to `:memory:` would otherwise see its own empty
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
