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


//! Database storage and models
//!
//! This module handles all catalog persistence using SQLite via sqlx.
//!
//! # Database Schema
//! - Genres, Languages, Authors: independent leaf tables
//! - Books: title records; author and language are nulled on delete
//! - BookGenres: Book <-> Genre junction, in association order
//! - BookInstances: physical copies; a Book cannot be deleted while copies exist
//! - Users: borrowers (nulled on delete)
//! - Permissions: declared permission markers
//!
//! # Usage Example
//! ```no_run
//! use catalog_core::storage::{Database, queries, models::{NewAuthor, NewBook}};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./catalog.db").await?;
//!
//! let author_id = queries::insert_author(db.pool(), &NewAuthor::new("J.R.R.", "Tolkien")).await?;
//! let mut book = NewBook::new("The Hobbit", "There and back again.", "9780261102217");
//! book.author_id = Some(author_id);
//! let book_id = queries::insert_book(db.pool(), &book).await?;
//!
//! let genres = queries::display_genre_for_book(db.pool(), book_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod users;

// Re-export commonly used types
pub use database::{Database, DatabaseStats};
pub use models::{
    Author, Book, BookInstance, BookInstanceWithTitle, Genre, Language, LoanStatus, NewAuthor,
    NewBook, NewBookInstance, NewGenre, NewLanguage, NewUser, Permission, PermissionDecl, User,
    CAN_MARK_RETURNED,
};
pub use queries::{BookDetail, BookSummary, CatalogStats};
