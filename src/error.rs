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


//! Error types for the catalog
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they come from: field validation, storage
//! constraints, configuration, and wrapped driver errors.
//!
//! ## Field validation
//! - Empty required field → `MissingRequiredField`
//! - Value over the column's max length → `FieldTooLong`
//! - Unknown loan status code → `InvalidInput`
//!
//! ## Storage constraints
//! - Deleting a Book that still has copies → `DeleteRestricted`
//! - Any other foreign key / unique / not-null / check failure → `IntegrityViolation`
//!
//! Constraint failures are detected by SQLite itself; the `From<sqlx::Error>`
//! conversion below classifies them so callers can match on the variant
//! instead of parsing driver messages.

use thiserror::Error;

/// Result type alias using our CatalogError type
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Which storage constraint rejected a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Unique => "unique",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
            ConstraintKind::Other => "constraint",
        };
        f.write_str(name)
    }
}

/// Main error type for the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    // ===== Field Validation Errors =====

    /// Required field is empty
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Field value is longer than the column allows
    #[error("Field '{field}' is too long: {actual} characters (max {max})")]
    FieldTooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== Database Errors =====

    /// Database record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Delete blocked because other records still reference this one
    #[error("Cannot delete {entity} {id}: it is still referenced by {dependents}")]
    DeleteRestricted {
        entity: String,
        id: String,
        dependents: String,
    },

    /// Storage rejected a write because it breaks a schema constraint
    #[error("Integrity violation ({kind}): {message}")]
    IntegrityViolation {
        kind: ConstraintKind,
        message: String,
    },

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[source] sqlx::Error),

    // ===== Configuration Errors =====

    /// Configuration value is missing or malformed
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ===== File Errors =====

    /// File system error with the path it happened on
    #[error("File I/O error on {path}: {source}")]
    FileIoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                sqlx::error::ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                sqlx::error::ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                sqlx::error::ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                _ => constraint_kind_from_message(db_err.message()),
            },
            _ => None,
        };

        match (kind, &err) {
            (Some(kind), sqlx::Error::Database(db_err)) => CatalogError::IntegrityViolation {
                kind,
                message: db_err.message().to_string(),
            },
            _ => CatalogError::SqlxError(err),
        }
    }
}

/// Fallback for drivers that only report the primary SQLITE_CONSTRAINT code
fn constraint_kind_from_message(message: &str) -> Option<ConstraintKind> {
    if !message.contains("constraint failed") {
        return None;
    }
    let kind = if message.starts_with("FOREIGN KEY") {
        ConstraintKind::ForeignKey
    } else if message.starts_with("UNIQUE") {
        ConstraintKind::Unique
    } else if message.starts_with("NOT NULL") {
        ConstraintKind::NotNull
    } else if message.starts_with("CHECK") {
        ConstraintKind::Check
    } else {
        ConstraintKind::Other
    };
    Some(kind)
}

// Helper methods for creating common errors
impl CatalogError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        CatalogError::RecordNotFound(resource.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        CatalogError::InvalidInput(message.into())
    }

    /// Create a FileIoError for `path`
    pub fn file_io<P: AsRef<std::path::Path>>(path: P, source: std::io::Error) -> Self {
        CatalogError::FileIoError {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a DeleteRestricted error
    pub fn delete_restricted<E, I, D>(entity: E, id: I, dependents: D) -> Self
    where
        E: Into<String>,
        I: ToString,
        D: Into<String>,
    {
        CatalogError::DeleteRestricted {
            entity: entity.into(),
            id: id.to_string(),
            dependents: dependents.into(),
        }
    }

    /// Check if the error came from a schema constraint
    ///
    /// Covers both field validation done before the write and constraint
    /// failures reported by SQLite.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            CatalogError::MissingRequiredField(_)
                | CatalogError::FieldTooLong { .. }
                | CatalogError::DeleteRestricted { .. }
                | CatalogError::IntegrityViolation { .. }
        )
    }

    /// Check if the error is a foreign key failure
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            CatalogError::IntegrityViolation {
                kind: ConstraintKind::ForeignKey,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::RecordNotFound(_))
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::DeleteRestricted { entity, dependents, .. } => {
                format!(
                    "This {} cannot be deleted while {} still reference it. Remove them first.",
                    entity.to_lowercase(),
                    dependents
                )
            }
            CatalogError::FieldTooLong { field, max, .. } => {
                format!("'{}' must be at most {} characters long.", field, max)
            }
            CatalogError::MissingRequiredField(field) => {
                format!("'{}' is required.", field)
            }
            _ => self.to_string(),
        }
    }
}
