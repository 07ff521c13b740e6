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


//! Runtime configuration
//!
//! Values come from, in increasing priority: built-in defaults, environment
//! variables (`CATALOG_*`), and whatever the caller sets afterwards (the CLI
//! applies its flags on top of [`CatalogConfig::from_env`]).

use crate::error::{CatalogError, Result};
use crate::storage::Database;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATABASE_PATH: &str = "CATALOG_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "CATALOG_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_SECS: &str = "CATALOG_BUSY_TIMEOUT_SECS";
pub const ENV_LOG: &str = "CATALOG_LOG";

/// Catalog configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long a connection waits on a locked database
    pub busy_timeout: Duration,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: Database::get_default_path(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
            log_filter: "info".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Build configuration from process environment
    ///
    /// # Errors
    /// Returns `ConfigurationError` if a numeric variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Split out from [`from_env`](Self::from_env) so tests do not have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            let value: u32 = raw.trim().parse().map_err(|e| {
                CatalogError::ConfigurationError(format!("{}={:?}: {}", ENV_MAX_CONNECTIONS, raw, e))
            })?;
            if value == 0 {
                return Err(CatalogError::ConfigurationError(format!(
                    "{} must be at least 1",
                    ENV_MAX_CONNECTIONS
                )));
            }
            config.max_connections = value;
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                CatalogError::ConfigurationError(format!("{}={:?}: {}", ENV_BUSY_TIMEOUT_SECS, raw, e))
            })?;
            config.busy_timeout = Duration::from_secs(secs);
        }

        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        Ok(config)
    }

    pub fn with_database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = path.into();
        self
    }
}
