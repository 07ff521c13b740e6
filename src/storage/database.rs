// Library Catalog - catalog data model and storage
// Copyright (C) 2025 Library Catalog contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Database connection and management
//!
//! This module handles database connection pooling, initialization, and maintenance.
//!
//! # Database Location
//! - Desktop (macOS): ~/Library/Application Support/LibraryCatalog/catalog.db
//! - Desktop (Linux): ~/.local/share/LibraryCatalog/catalog.db
//! - Desktop (Windows): %APPDATA%/LibraryCatalog/catalog.db
//! - Override with `CATALOG_DATABASE_PATH` (see [`crate::config`])
//!
//! # SQLite Configuration
//! - WAL mode for better concurrency
//! - Foreign keys enabled (required for the SET NULL / RESTRICT policies)
//! - Incremental auto-vacuum for space efficiency
//! - Normal synchronous mode (balance safety/speed)

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    ConnectOptions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database manager - handles connection pooling and operations
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>, // None for in-memory databases
}

impl Database {
    /// Create new database connection with migrations, using default pool settings
    ///
    /// # Arguments
    /// * `database_path` - Path to SQLite database file (will be created if doesn't exist)
    ///
    /// # Errors
    /// Returns error if:
    /// - Parent directory doesn't exist and can't be created
    /// - Database file can't be opened
    /// - Migrations fail
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let config = CatalogConfig::default().with_database_path(database_path.as_ref());
        Self::with_config(&config).await
    }

    /// Open the database described by `config` and run migrations
    pub async fn with_config(config: &CatalogConfig) -> Result<Self> {
        let path = config.database_path.as_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| CatalogError::file_io(parent, e))?;
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        Self::configure_database(&pool).await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        info!(path = %path.display(), max_connections = config.max_connections, "opened catalog database");
        Ok(db)
    }

    /// Create in-memory database for testing
    ///
    /// # Errors
    /// Returns error if database creation or migration fails
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;

        Self::configure_database(&pool).await?;

        let db = Self { pool, path: None };
        db.migrate().await?;

        debug!("opened in-memory catalog database");
        Ok(db)
    }

    /// Configure database with pragmas
    ///
    /// WAL and foreign keys are already set in the connect options.
    async fn configure_database(pool: &SqlitePool) -> Result<()> {
        sqlx::query("PRAGMA auto_vacuum = INCREMENTAL")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Run database migrations
    ///
    /// Migrations are run automatically when creating a new database connection.
    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| CatalogError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    /// Get reference to the connection pool
    ///
    /// Pass this to the functions in [`crate::storage::queries`]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    ///
    /// Returns `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close database and release all connections
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Get default database path for the platform
    pub fn get_default_path() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("LibraryCatalog")
                .join("catalog.db")
        }

        #[cfg(target_os = "linux")]
        {
            let data_home = std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                    PathBuf::from(home).join(".local").join("share")
                });
            data_home.join("LibraryCatalog").join("catalog.db")
        }

        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata)
                .join("LibraryCatalog")
                .join("catalog.db")
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            PathBuf::from("./catalog.db")
        }
    }

    /// Storage footprint and schema version
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let mut pragmas = [0i64; 3];
        for (slot, pragma) in pragmas
            .iter_mut()
            .zip(["PRAGMA page_count", "PRAGMA page_size", "PRAGMA freelist_count"])
        {
            *slot = sqlx::query_scalar(pragma).fetch_one(&self.pool).await?;
        }
        let [page_count, page_size, free_pages] = pragmas;

        let schema_version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            schema_version,
            size_bytes: page_count * page_size,
            free_bytes: free_pages * page_size,
        })
    }

    /// Refresh planner statistics, then reclaim free pages
    ///
    /// Not valid inside a transaction. Returns the bytes reclaimed.
    pub async fn compact(&self) -> Result<i64> {
        let before = self.get_stats().await?;
        sqlx::query("ANALYZE").execute(&self.pool).await?;
        sqlx::query("VACUUM").execute(&self.pool).await?;
        let after = self.get_stats().await?;

        let reclaimed = (before.size_bytes - after.size_bytes).max(0);
        info!(reclaimed, size = after.size_bytes, "compacted catalog database");
        Ok(reclaimed)
    }

    /// Check database integrity
    ///
    /// Runs SQLite integrity check and returns true if database is okay.
    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }

    /// Faster variant of [`check_integrity`](Self::check_integrity) that skips index checks
    pub async fn quick_check(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }

    /// List foreign key violations left in the data
    ///
    /// Always empty while `foreign_keys` is on; useful after importing a
    /// file written by another tool.
    pub async fn foreign_key_violations(&self) -> Result<Vec<String>> {
        let rows: Vec<(String, Option<i64>, String, i64)> =
            sqlx::query_as("PRAGMA foreign_key_check")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(table, rowid, parent, _fkid)| match rowid {
                Some(rowid) => format!("{} row {} -> {}", table, rowid, parent),
                None => format!("{} -> {}", table, parent),
            })
            .collect())
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    /// Highest applied migration id
    pub schema_version: i64,
    pub size_bytes: i64,
    /// Space held by free pages, reclaimable by [`Database::compact`]
    pub free_bytes: i64,
}
