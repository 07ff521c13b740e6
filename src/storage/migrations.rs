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


//! Database migrations
//!
//! This module handles database schema creation and migrations.
//!
//! # Migration Strategy
//! Since sqlx's compile-time migration system requires build-time database connection,
//! migrations are plain runtime SQL tracked in the `_migrations` table.
//!
//! # Deletion Policies
//! - `Books.author_id`, `Books.language_id`: `ON DELETE SET NULL`
//! - `BookInstances.book_id`: `ON DELETE RESTRICT`
//! - `BookInstances.borrower_id`: `ON DELETE SET NULL`
//! - `BookGenres`: cascades from both sides
//!
//! Field limits are repeated here as `CHECK` constraints so writes that skip
//! the model validation are still rejected.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info};

/// Run all database migrations
///
/// This function creates the database schema and applies any pending migrations.
/// Migrations are tracked in the `_migrations` table.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create migrations tracking table
    create_migrations_table(pool).await?;

    // Run all migrations in order
    run_migration(pool, 1, "initial_schema", create_initial_schema(pool)).await?;

    Ok(())
}

/// Create migrations tracking table
async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run a single migration if it hasn't been applied yet
async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        debug!(migration = name, "migration already applied");
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    info!(migration = name, id, "applied migration");
    Ok(())
}

/// Create initial database schema
///
/// Creates all catalog tables with their relationships, indexes, and constraints.
async fn create_initial_schema(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
-- ============================================================================
-- LEAF ENTITIES
-- ============================================================================

CREATE TABLE IF NOT EXISTS Genres (
    genre_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0 AND length(name) <= 200)
);

CREATE TABLE IF NOT EXISTS Languages (
    language_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0 AND length(name) <= 200)
);

CREATE TABLE IF NOT EXISTS Authors (
    author_id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL CHECK (length(trim(first_name)) > 0 AND length(first_name) <= 100),
    last_name TEXT NOT NULL CHECK (length(trim(last_name)) > 0 AND length(last_name) <= 100),
    date_of_birth TEXT,  -- ISO 8601 date (YYYY-MM-DD)
    date_of_death TEXT   -- "Died"
);

-- Stand-in for the authentication layer's user table (borrowers)
CREATE TABLE IF NOT EXISTS Users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE CHECK (length(trim(username)) > 0 AND length(username) <= 150)
);

-- ============================================================================
-- BOOKS
-- ============================================================================

-- isbn is deliberately not UNIQUE
CREATE TABLE IF NOT EXISTS Books (
    book_id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0 AND length(title) <= 200),
    author_id INTEGER,
    summary TEXT NOT NULL CHECK (length(trim(summary)) > 0 AND length(summary) <= 1000),
    isbn TEXT NOT NULL CHECK (length(trim(isbn)) > 0 AND length(isbn) <= 13),
    language_id INTEGER,
    FOREIGN KEY (author_id) REFERENCES Authors(author_id) ON DELETE SET NULL,
    FOREIGN KEY (language_id) REFERENCES Languages(language_id) ON DELETE SET NULL
);

-- Book <-> Genre junction; book_genre_id keeps association order
CREATE TABLE IF NOT EXISTS BookGenres (
    book_genre_id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id INTEGER NOT NULL,
    genre_id INTEGER NOT NULL,
    FOREIGN KEY (book_id) REFERENCES Books(book_id) ON DELETE CASCADE,
    FOREIGN KEY (genre_id) REFERENCES Genres(genre_id) ON DELETE CASCADE,
    UNIQUE (book_id, genre_id)
);

-- ============================================================================
-- BOOK INSTANCES (physical copies)
-- ============================================================================

CREATE TABLE IF NOT EXISTS BookInstances (
    instance_id BLOB PRIMARY KEY NOT NULL CHECK (length(instance_id) = 16),
    book_id INTEGER,
    imprint TEXT NOT NULL CHECK (length(trim(imprint)) > 0 AND length(imprint) <= 200),
    due_back TEXT,  -- ISO 8601 date (YYYY-MM-DD)
    status TEXT NOT NULL DEFAULT 'm' CHECK (status IN ('m', 'o', 'a', 'r')),
    borrower_id INTEGER,
    FOREIGN KEY (book_id) REFERENCES Books(book_id) ON DELETE RESTRICT,
    FOREIGN KEY (borrower_id) REFERENCES Users(user_id) ON DELETE SET NULL
);

-- ============================================================================
-- PERMISSIONS
-- ============================================================================

CREATE TABLE IF NOT EXISTS Permissions (
    permission_id INTEGER PRIMARY KEY AUTOINCREMENT,
    codename TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    content_type TEXT NOT NULL
);

INSERT OR IGNORE INTO Permissions (codename, name, content_type)
VALUES ('can_mark_returned', 'Set book as returned', 'BookInstances');

-- ============================================================================
-- INDEXES
-- ============================================================================

CREATE INDEX IF NOT EXISTS idx_authors_name ON Authors(last_name, first_name);
CREATE INDEX IF NOT EXISTS idx_books_title ON Books(title);
CREATE INDEX IF NOT EXISTS idx_books_author ON Books(author_id);
CREATE INDEX IF NOT EXISTS idx_books_language ON Books(language_id);
CREATE INDEX IF NOT EXISTS idx_book_genres_book ON BookGenres(book_id, book_genre_id);
CREATE INDEX IF NOT EXISTS idx_book_genres_genre ON BookGenres(genre_id);
CREATE INDEX IF NOT EXISTS idx_book_instances_book ON BookInstances(book_id);
CREATE INDEX IF NOT EXISTS idx_book_instances_due_back ON BookInstances(due_back);
CREATE INDEX IF NOT EXISTS idx_book_instances_borrower ON BookInstances(borrower_id, status);
        "#,
    )
    .await?;

    Ok(())
}
