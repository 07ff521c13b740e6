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


//! Database query functions
//!
//! Repository-style functions over a `SqlitePool`, one section per entity.
//!
//! # Query Patterns
//! - Async/await for all database operations
//! - Field validation runs before any write; the schema's CHECK and
//!   foreign key constraints back it up
//! - Multi-statement writes (book + genre set) run in a transaction
//! - Default orderings: authors by (last_name, first_name), book
//!   instances by due_back with unset dates first

use crate::error::{CatalogError, Result};
use crate::storage::models::*;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const INSTANCE_WITH_TITLE: &str = r#"
    SELECT bi.instance_id, bi.book_id, bi.imprint, bi.due_back, bi.status, bi.borrower_id,
           b.title AS book_title
    FROM BookInstances bi
    LEFT JOIN Books b ON bi.book_id = b.book_id
"#;

// ============================================================================
// GENRE QUERIES
// ============================================================================

/// Insert a new genre, returning its id
pub async fn insert_genre(pool: &SqlitePool, genre: &NewGenre) -> Result<i64> {
    genre.validate()?;

    let result = sqlx::query("INSERT INTO Genres (name) VALUES (?)")
        .bind(&genre.name)
        .execute(pool)
        .await?;

    debug!(genre_id = result.last_insert_rowid(), name = %genre.name, "inserted genre");
    Ok(result.last_insert_rowid())
}

pub async fn find_genre_by_id(pool: &SqlitePool, genre_id: i64) -> Result<Option<Genre>> {
    let genre = sqlx::query_as::<_, Genre>("SELECT * FROM Genres WHERE genre_id = ?")
        .bind(genre_id)
        .fetch_optional(pool)
        .await?;

    Ok(genre)
}

/// List all genres by name
pub async fn list_genres(pool: &SqlitePool) -> Result<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>("SELECT * FROM Genres ORDER BY name, genre_id")
        .fetch_all(pool)
        .await?;

    Ok(genres)
}

pub async fn update_genre(pool: &SqlitePool, genre: &Genre) -> Result<()> {
    require_text("name", &genre.name, GENRE_NAME_MAX)?;

    let result = sqlx::query("UPDATE Genres SET name = ? WHERE genre_id = ?")
        .bind(&genre.name)
        .bind(genre.genre_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Genre {}", genre.genre_id)));
    }
    Ok(())
}

/// Delete a genre; it disappears from every book's genre set
pub async fn delete_genre(pool: &SqlitePool, genre_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM Genres WHERE genre_id = ?")
        .bind(genre_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Genre {}", genre_id)));
    }
    info!(genre_id, "deleted genre");
    Ok(())
}

pub async fn count_genres(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Genres")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ============================================================================
// LANGUAGE QUERIES
// ============================================================================

/// Insert a new language, returning its id
pub async fn insert_language(pool: &SqlitePool, language: &NewLanguage) -> Result<i64> {
    language.validate()?;

    let result = sqlx::query("INSERT INTO Languages (name) VALUES (?)")
        .bind(&language.name)
        .execute(pool)
        .await?;

    debug!(language_id = result.last_insert_rowid(), name = %language.name, "inserted language");
    Ok(result.last_insert_rowid())
}

pub async fn find_language_by_id(pool: &SqlitePool, language_id: i64) -> Result<Option<Language>> {
    let language = sqlx::query_as::<_, Language>("SELECT * FROM Languages WHERE language_id = ?")
        .bind(language_id)
        .fetch_optional(pool)
        .await?;

    Ok(language)
}

pub async fn list_languages(pool: &SqlitePool) -> Result<Vec<Language>> {
    let languages =
        sqlx::query_as::<_, Language>("SELECT * FROM Languages ORDER BY name, language_id")
            .fetch_all(pool)
            .await?;

    Ok(languages)
}

pub async fn update_language(pool: &SqlitePool, language: &Language) -> Result<()> {
    require_text("name", &language.name, LANGUAGE_NAME_MAX)?;

    let result = sqlx::query("UPDATE Languages SET name = ? WHERE language_id = ?")
        .bind(&language.name)
        .bind(language.language_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Language {}", language.language_id)));
    }
    Ok(())
}

/// Delete a language (books keep existing with `language_id` set to NULL)
pub async fn delete_language(pool: &SqlitePool, language_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM Languages WHERE language_id = ?")
        .bind(language_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Language {}", language_id)));
    }
    info!(language_id, "deleted language");
    Ok(())
}

// ============================================================================
// AUTHOR QUERIES
// ============================================================================

/// Insert a new author, returning its id
pub async fn insert_author(pool: &SqlitePool, author: &NewAuthor) -> Result<i64> {
    author.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO Authors (first_name, last_name, date_of_birth, date_of_death)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(author.date_of_birth)
    .bind(author.date_of_death)
    .execute(pool)
    .await?;

    debug!(author_id = result.last_insert_rowid(), "inserted author");
    Ok(result.last_insert_rowid())
}

pub async fn find_author_by_id(pool: &SqlitePool, author_id: i64) -> Result<Option<Author>> {
    let author = sqlx::query_as::<_, Author>("SELECT * FROM Authors WHERE author_id = ?")
        .bind(author_id)
        .fetch_optional(pool)
        .await?;

    Ok(author)
}

/// List all authors in default order (last name, then first name)
pub async fn list_authors(pool: &SqlitePool) -> Result<Vec<Author>> {
    let authors = sqlx::query_as::<_, Author>(
        "SELECT * FROM Authors ORDER BY last_name, first_name, author_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(authors)
}

pub async fn update_author(pool: &SqlitePool, author: &Author) -> Result<()> {
    require_text("first_name", &author.first_name, AUTHOR_NAME_MAX)?;
    require_text("last_name", &author.last_name, AUTHOR_NAME_MAX)?;

    let result = sqlx::query(
        r#"
        UPDATE Authors SET
            first_name = ?, last_name = ?, date_of_birth = ?, date_of_death = ?
        WHERE author_id = ?
        "#,
    )
    .bind(&author.first_name)
    .bind(&author.last_name)
    .bind(author.date_of_birth)
    .bind(author.date_of_death)
    .bind(author.author_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Author {}", author.author_id)));
    }
    Ok(())
}

/// Delete an author (their books keep existing with `author_id` set to NULL)
pub async fn delete_author(pool: &SqlitePool, author_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM Authors WHERE author_id = ?")
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Author {}", author_id)));
    }
    info!(author_id, "deleted author");
    Ok(())
}

pub async fn count_authors(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Authors")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ============================================================================
// BOOK QUERIES
// ============================================================================

/// Insert a new book together with its genre set
///
/// Returns the book_id of the inserted book. Nothing is written if any
/// referenced author, language or genre does not exist.
pub async fn insert_book(pool: &SqlitePool, book: &NewBook) -> Result<i64> {
    book.validate()?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO Books (title, author_id, summary, isbn, language_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&book.title)
    .bind(book.author_id)
    .bind(&book.summary)
    .bind(&book.isbn)
    .bind(book.language_id)
    .execute(&mut *tx)
    .await?;
    let book_id = result.last_insert_rowid();

    for genre_id in &book.genre_ids {
        sqlx::query("INSERT OR IGNORE INTO BookGenres (book_id, genre_id) VALUES (?, ?)")
            .bind(book_id)
            .bind(*genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    debug!(book_id, title = %book.title, genres = book.genre_ids.len(), "inserted book");
    Ok(book_id)
}

/// Find book by ID
pub async fn find_book_by_id(pool: &SqlitePool, book_id: i64) -> Result<Option<Book>> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM Books WHERE book_id = ?")
        .bind(book_id)
        .fetch_optional(pool)
        .await?;

    Ok(book)
}

/// Update an existing book's own fields
///
/// The genre set is changed with [`set_book_genres`].
pub async fn update_book(pool: &SqlitePool, book: &Book) -> Result<()> {
    validate_book_fields(&book.title, &book.summary, &book.isbn)?;

    let result = sqlx::query(
        r#"
        UPDATE Books SET
            title = ?, author_id = ?, summary = ?, isbn = ?, language_id = ?
        WHERE book_id = ?
        "#,
    )
    .bind(&book.title)
    .bind(book.author_id)
    .bind(&book.summary)
    .bind(&book.isbn)
    .bind(book.language_id)
    .bind(book.book_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("Book {}", book.book_id)));
    }
    Ok(())
}

/// List books with pagination, ordered by title
pub async fn list_books(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        "SELECT * FROM Books ORDER BY title, book_id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// Count total books
pub async fn count_books(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Books")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Search books by title (case-insensitive substring)
///
/// The query is matched literally; `%` and `_` are not wildcards. Case
/// folding covers ASCII letters only.
pub async fn search_books_by_title(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        "SELECT * FROM Books WHERE instr(lower(title), lower(?)) > 0 ORDER BY title, book_id LIMIT ?",
    )
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// Delete a book
///
/// Fails with `DeleteRestricted` while any book instance references the
/// book; the book and its instances are left untouched. Genre associations
/// are removed along with the book.
pub async fn delete_book(pool: &SqlitePool, book_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM Books WHERE book_id = ?")
        .bind(book_id)
        .execute(pool)
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            Err(CatalogError::not_found(format!("Book {}", book_id)))
        }
        Ok(_) => {
            info!(book_id, "deleted book");
            Ok(())
        }
        Err(e) => {
            let err = CatalogError::from(e);
            if err.is_foreign_key_violation() {
                warn!(book_id, "refused to delete book with existing copies");
                Err(CatalogError::delete_restricted("Book", book_id, "book instances"))
            } else {
                Err(err)
            }
        }
    }
}

/// Books written by an author, ordered by title
pub async fn books_by_author(pool: &SqlitePool, author_id: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        "SELECT * FROM Books WHERE author_id = ? ORDER BY title, book_id",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// Books in a language, ordered by title
pub async fn books_by_language(pool: &SqlitePool, language_id: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        "SELECT * FROM Books WHERE language_id = ? ORDER BY title, book_id",
    )
    .bind(language_id)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

// ============================================================================
// BOOK <-> GENRE QUERIES
// ============================================================================

/// Add a genre to a book's genre set (no-op if already present)
///
/// A newly added genre goes to the end of the association order.
pub async fn add_book_genre(pool: &SqlitePool, book_id: i64, genre_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO BookGenres (book_id, genre_id) VALUES (?, ?)")
        .bind(book_id)
        .bind(genre_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Remove a genre from a book's genre set
pub async fn remove_book_genre(pool: &SqlitePool, book_id: i64, genre_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM BookGenres WHERE book_id = ? AND genre_id = ?")
        .bind(book_id)
        .bind(genre_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Replace a book's whole genre set; `genre_ids` order becomes the association order
pub async fn set_book_genres(pool: &SqlitePool, book_id: i64, genre_ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT book_id FROM Books WHERE book_id = ?")
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(CatalogError::not_found(format!("Book {}", book_id)));
    }

    sqlx::query("DELETE FROM BookGenres WHERE book_id = ?")
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

    for genre_id in genre_ids {
        sqlx::query("INSERT OR IGNORE INTO BookGenres (book_id, genre_id) VALUES (?, ?)")
            .bind(book_id)
            .bind(*genre_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All genres of a book, in association order
pub async fn genres_for_book(pool: &SqlitePool, book_id: i64) -> Result<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>(
        r#"
        SELECT g.* FROM Genres g
        INNER JOIN BookGenres bg ON g.genre_id = bg.genre_id
        WHERE bg.book_id = ?
        ORDER BY bg.book_genre_id
        "#,
    )
    .bind(book_id)
    .fetch_all(pool)
    .await?;

    Ok(genres)
}

/// All books tagged with a genre, ordered by title
pub async fn books_by_genre(pool: &SqlitePool, genre_id: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT b.* FROM Books b
        INNER JOIN BookGenres bg ON b.book_id = bg.book_id
        WHERE bg.genre_id = ?
        ORDER BY b.title, b.book_id
        "#,
    )
    .bind(genre_id)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// `display_genre` for a stored book: first three genre names joined by ", "
pub async fn display_genre_for_book(pool: &SqlitePool, book_id: i64) -> Result<String> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT g.name FROM Genres g
        INNER JOIN BookGenres bg ON g.genre_id = bg.genre_id
        WHERE bg.book_id = ?
        ORDER BY bg.book_genre_id
        LIMIT ?
        "#,
    )
    .bind(book_id)
    .bind(DISPLAY_GENRE_LIMIT as i64)
    .fetch_all(pool)
    .await?;

    Ok(display_genre(names.iter().map(String::as_str)))
}

// ============================================================================
// BOOK LISTINGS WITH RELATIONS
// ============================================================================

/// Book with its author name and genres, for list views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSummary {
    pub book: Book,
    /// Author display string ("last, first") if the book has an author
    pub author_name: Option<String>,
    pub genres: Vec<Genre>,
}

impl BookSummary {
    pub fn display_genre(&self) -> String {
        self.book.display_genre(&self.genres)
    }
}

#[derive(sqlx::FromRow)]
struct BookRowWithAuthor {
    #[sqlx(flatten)]
    book: Book,
    author_name: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookGenreRow {
    book_id: i64,
    genre_id: i64,
    name: String,
}

/// List books (by title) with author name and genres, two queries per page
pub async fn list_books_with_relations(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> Result<Vec<BookSummary>> {
    let rows = sqlx::query_as::<_, BookRowWithAuthor>(
        r#"
        SELECT b.book_id, b.title, b.author_id, b.summary, b.isbn, b.language_id,
               CASE WHEN a.author_id IS NULL THEN NULL
                    ELSE a.last_name || ', ' || a.first_name END AS author_name
        FROM Books b
        LEFT JOIN Authors a ON b.author_id = a.author_id
        ORDER BY b.title, b.book_id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let genre_rows = sqlx::query_as::<_, BookGenreRow>(
        r#"
        SELECT bg.book_id, g.genre_id, g.name
        FROM BookGenres bg
        INNER JOIN Genres g ON g.genre_id = bg.genre_id
        WHERE bg.book_id IN (
            SELECT book_id FROM Books ORDER BY title, book_id LIMIT ? OFFSET ?
        )
        ORDER BY bg.book_genre_id
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut genres_by_book: HashMap<i64, Vec<Genre>> = HashMap::new();
    for row in genre_rows {
        genres_by_book.entry(row.book_id).or_default().push(Genre {
            genre_id: row.genre_id,
            name: row.name,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| BookSummary {
            genres: genres_by_book.remove(&row.book.book_id).unwrap_or_default(),
            author_name: row.author_name,
            book: row.book,
        })
        .collect())
}

/// Everything a book detail view shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    pub instances: Vec<BookInstance>,
}

impl BookDetail {
    pub fn display_genre(&self) -> String {
        self.book.display_genre(&self.genres)
    }

    pub fn url(&self) -> String {
        self.book.get_absolute_url()
    }
}

/// Load a book with its author, language, genres and copies
pub async fn find_book_detail(pool: &SqlitePool, book_id: i64) -> Result<Option<BookDetail>> {
    let Some(book) = find_book_by_id(pool, book_id).await? else {
        return Ok(None);
    };

    let author = match book.author_id {
        Some(id) => find_author_by_id(pool, id).await?,
        None => None,
    };
    let language = match book.language_id {
        Some(id) => find_language_by_id(pool, id).await?,
        None => None,
    };
    let genres = genres_for_book(pool, book_id).await?;
    let instances = instances_for_book(pool, book_id).await?;

    Ok(Some(BookDetail {
        book,
        author,
        language,
        genres,
        instances,
    }))
}

// ============================================================================
// BOOK INSTANCE QUERIES
// ============================================================================

/// Insert a new book instance, returning its generated id
pub async fn insert_book_instance(pool: &SqlitePool, instance: &NewBookInstance) -> Result<Uuid> {
    instance.validate()?;
    let instance_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO BookInstances (instance_id, book_id, imprint, due_back, status, borrower_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(instance_id)
    .bind(instance.book_id)
    .bind(&instance.imprint)
    .bind(instance.due_back)
    .bind(instance.status.code())
    .bind(instance.borrower_id)
    .execute(pool)
    .await?;

    debug!(%instance_id, book_id = ?instance.book_id, status = %instance.status, "inserted book instance");
    Ok(instance_id)
}

pub async fn find_book_instance(pool: &SqlitePool, instance_id: Uuid) -> Result<Option<BookInstance>> {
    let instance =
        sqlx::query_as::<_, BookInstance>("SELECT * FROM BookInstances WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_optional(pool)
            .await?;

    Ok(instance)
}

/// Book instance with its book's title, for display strings
pub async fn find_book_instance_with_title(
    pool: &SqlitePool,
    instance_id: Uuid,
) -> Result<Option<BookInstanceWithTitle>> {
    let sql = format!("{} WHERE bi.instance_id = ?", INSTANCE_WITH_TITLE);
    let instance = sqlx::query_as::<_, BookInstanceWithTitle>(&sql)
        .bind(instance_id)
        .fetch_optional(pool)
        .await?;

    Ok(instance)
}

/// All book instances in default order (due_back ascending, unset first)
pub async fn list_book_instances(pool: &SqlitePool) -> Result<Vec<BookInstanceWithTitle>> {
    let sql = format!("{} ORDER BY bi.due_back, bi.rowid", INSTANCE_WITH_TITLE);
    let instances = sqlx::query_as::<_, BookInstanceWithTitle>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(instances)
}

/// Copies of one book in default order
pub async fn instances_for_book(pool: &SqlitePool, book_id: i64) -> Result<Vec<BookInstance>> {
    let instances = sqlx::query_as::<_, BookInstance>(
        "SELECT * FROM BookInstances WHERE book_id = ? ORDER BY due_back, rowid",
    )
    .bind(book_id)
    .fetch_all(pool)
    .await?;

    Ok(instances)
}

/// Update every field of a book instance except its id
///
/// Any status may be written regardless of the current one.
pub async fn update_book_instance(pool: &SqlitePool, instance: &BookInstance) -> Result<()> {
    require_text("imprint", &instance.imprint, IMPRINT_MAX)?;
    if LoanStatus::from_code(&instance.status).is_none() {
        return Err(CatalogError::invalid_input(format!(
            "Unknown loan status code: {:?}",
            instance.status
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE BookInstances SET
            book_id = ?, imprint = ?, due_back = ?, status = ?, borrower_id = ?
        WHERE instance_id = ?
        "#,
    )
    .bind(instance.book_id)
    .bind(&instance.imprint)
    .bind(instance.due_back)
    .bind(&instance.status)
    .bind(instance.borrower_id)
    .bind(instance.instance_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("BookInstance {}", instance.instance_id)));
    }
    Ok(())
}

/// Set the loan status of a copy
pub async fn set_instance_status(pool: &SqlitePool, instance_id: Uuid, status: LoanStatus) -> Result<()> {
    let result = sqlx::query("UPDATE BookInstances SET status = ? WHERE instance_id = ?")
        .bind(status.code())
        .bind(instance_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("BookInstance {}", instance_id)));
    }
    debug!(%instance_id, %status, "set book instance status");
    Ok(())
}

pub async fn delete_book_instance(pool: &SqlitePool, instance_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM BookInstances WHERE instance_id = ?")
        .bind(instance_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("BookInstance {}", instance_id)));
    }
    info!(%instance_id, "deleted book instance");
    Ok(())
}

pub async fn count_book_instances(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM BookInstances")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn count_instances_by_status(pool: &SqlitePool, status: LoanStatus) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM BookInstances WHERE status = ?")
        .bind(status.code())
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ============================================================================
// LOAN LISTINGS
// ============================================================================

/// Copies on loan to one borrower, soonest due first
pub async fn loaned_instances_for_borrower(
    pool: &SqlitePool,
    borrower_id: i64,
) -> Result<Vec<BookInstanceWithTitle>> {
    let sql = format!(
        "{} WHERE bi.borrower_id = ? AND bi.status = ? ORDER BY bi.due_back, bi.rowid",
        INSTANCE_WITH_TITLE
    );
    let instances = sqlx::query_as::<_, BookInstanceWithTitle>(&sql)
        .bind(borrower_id)
        .bind(LoanStatus::OnLoan.code())
        .fetch_all(pool)
        .await?;

    Ok(instances)
}

/// All copies on loan, soonest due first
pub async fn list_on_loan(pool: &SqlitePool) -> Result<Vec<BookInstanceWithTitle>> {
    let sql = format!(
        "{} WHERE bi.status = ? ORDER BY bi.due_back, bi.rowid",
        INSTANCE_WITH_TITLE
    );
    let instances = sqlx::query_as::<_, BookInstanceWithTitle>(&sql)
        .bind(LoanStatus::OnLoan.code())
        .fetch_all(pool)
        .await?;

    Ok(instances)
}

/// Copies whose due date is strictly before `today`
///
/// Same rule as `BookInstance::is_overdue_on`, evaluated in SQL.
pub async fn list_overdue(pool: &SqlitePool, today: NaiveDate) -> Result<Vec<BookInstanceWithTitle>> {
    let sql = format!(
        "{} WHERE bi.due_back IS NOT NULL AND bi.due_back < ? ORDER BY bi.due_back, bi.rowid",
        INSTANCE_WITH_TITLE
    );
    let instances = sqlx::query_as::<_, BookInstanceWithTitle>(&sql)
        .bind(today)
        .fetch_all(pool)
        .await?;

    Ok(instances)
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Catalog-wide counts for a home page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub num_books: i64,
    pub num_instances: i64,
    pub num_instances_available: i64,
    pub num_authors: i64,
    pub num_genres: i64,
}

pub async fn catalog_stats(pool: &SqlitePool) -> Result<CatalogStats> {
    Ok(CatalogStats {
        num_books: count_books(pool).await?,
        num_instances: count_book_instances(pool).await?,
        num_instances_available: count_instances_by_status(pool, LoanStatus::Available).await?,
        num_authors: count_authors(pool).await?,
        num_genres: count_genres(pool).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    async fn seed_book(db: &Database, title: &str, genre_ids: Vec<i64>) -> i64 {
        let mut book = NewBook::new(title, "A summary.", "9780000000000");
        book.genre_ids = genre_ids;
        insert_book(db.pool(), &book).await.expect("Failed to insert book")
    }

    #[tokio::test]
    async fn test_insert_and_find_book() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let author_id = insert_author(db.pool(), &NewAuthor::new("J.R.R.", "Tolkien"))
            .await
            .expect("Failed to insert author");
        let mut new_book = NewBook::new("The Hobbit", "There and back again.", "9780261102217");
        new_book.author_id = Some(author_id);

        let book_id = insert_book(db.pool(), &new_book).await.expect("Failed to insert book");
        assert!(book_id > 0);

        let book = find_book_by_id(db.pool(), book_id)
            .await
            .expect("Failed to find book")
            .expect("Book missing");
        assert_eq!(book.title, "The Hobbit");
        assert_eq!(book.author_id, Some(author_id));
        assert_eq!(book.language_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_isbn_is_allowed() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let first = seed_book(&db, "First printing", vec![]).await;
        let second = seed_book(&db, "Second printing", vec![]).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_genre_association_order_and_display() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut ids = Vec::new();
        for name in ["Poetry", "Fantasy", "Adventure", "Classic"] {
            ids.push(insert_genre(db.pool(), &NewGenre::new(name)).await.unwrap());
        }

        let book_id = seed_book(&db, "Sampler", vec![ids[1], ids[0], ids[3], ids[2]]).await;

        let names: Vec<String> = genres_for_book(db.pool(), book_id)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["Fantasy", "Poetry", "Classic", "Adventure"]);

        let display = display_genre_for_book(db.pool(), book_id).await.unwrap();
        assert_eq!(display, "Fantasy, Poetry, Classic");

        let empty = seed_book(&db, "No genres", vec![]).await;
        assert_eq!(display_genre_for_book(db.pool(), empty).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_set_and_remove_book_genres() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let fantasy = insert_genre(db.pool(), &NewGenre::new("Fantasy")).await.unwrap();
        let horror = insert_genre(db.pool(), &NewGenre::new("Horror")).await.unwrap();
        let book_id = seed_book(&db, "Tales", vec![fantasy]).await;

        set_book_genres(db.pool(), book_id, &[horror, fantasy]).await.unwrap();
        assert_eq!(
            display_genre_for_book(db.pool(), book_id).await.unwrap(),
            "Horror, Fantasy"
        );

        // Adding an existing genre keeps the set unchanged
        add_book_genre(db.pool(), book_id, horror).await.unwrap();
        assert_eq!(genres_for_book(db.pool(), book_id).await.unwrap().len(), 2);

        remove_book_genre(db.pool(), book_id, horror).await.unwrap();
        assert_eq!(display_genre_for_book(db.pool(), book_id).await.unwrap(), "Fantasy");

        let books = books_by_genre(db.pool(), fantasy).await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(books_by_genre(db.pool(), horror).await.unwrap().is_empty());

        let err = set_book_genres(db.pool(), 9999, &[fantasy]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_insert_book_with_unknown_genre_rolls_back() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut book = NewBook::new("Ghost", "Refers to a missing genre.", "1");
        book.genre_ids = vec![424242];

        let err = insert_book(db.pool(), &book).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
        assert_eq!(count_books(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_genre_removes_it_from_books() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let fantasy = insert_genre(db.pool(), &NewGenre::new("Fantasy")).await.unwrap();
        let epic = insert_genre(db.pool(), &NewGenre::new("Epic")).await.unwrap();
        let book_id = seed_book(&db, "The Silmarillion", vec![fantasy, epic]).await;

        delete_genre(db.pool(), fantasy).await.unwrap();

        assert!(find_book_by_id(db.pool(), book_id).await.unwrap().is_some());
        assert_eq!(display_genre_for_book(db.pool(), book_id).await.unwrap(), "Epic");
    }

    #[tokio::test]
    async fn test_authors_default_ordering() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        for (first, last) in [("Terry", "Pratchett"), ("Anne", "Brontë"), ("Charlotte", "Brontë")] {
            insert_author(db.pool(), &NewAuthor::new(first, last)).await.unwrap();
        }

        let names: Vec<String> = list_authors(db.pool())
            .await
            .unwrap()
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["Brontë, Anne", "Brontë, Charlotte", "Pratchett, Terry"]
        );
    }

    #[tokio::test]
    async fn test_update_author_and_dates() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut new_author = NewAuthor::new("Ursula", "Le Guin");
        new_author.date_of_birth = NaiveDate::from_ymd_opt(1929, 10, 21);
        let author_id = insert_author(db.pool(), &new_author).await.unwrap();

        let mut author = find_author_by_id(db.pool(), author_id).await.unwrap().unwrap();
        assert_eq!(author.date_of_birth, NaiveDate::from_ymd_opt(1929, 10, 21));
        assert_eq!(author.date_of_death, None);

        author.date_of_death = NaiveDate::from_ymd_opt(2018, 1, 22);
        update_author(db.pool(), &author).await.unwrap();

        let reloaded = find_author_by_id(db.pool(), author_id).await.unwrap().unwrap();
        assert_eq!(reloaded, author);

        author.author_id = 9999;
        assert!(update_author(db.pool(), &author).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_book_validates_fields() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let book_id = seed_book(&db, "Draft", vec![]).await;
        let mut book = find_book_by_id(db.pool(), book_id).await.unwrap().unwrap();

        book.isbn = "12345678901234".to_string();
        let err = update_book(db.pool(), &book).await.unwrap_err();
        assert!(matches!(err, CatalogError::FieldTooLong { .. }));

        book.isbn = "1234567890123".to_string();
        book.title = "Final".to_string();
        update_book(db.pool(), &book).await.unwrap();
        let reloaded = find_book_by_id(db.pool(), book_id).await.unwrap().unwrap();
        assert_eq!(reloaded.title, "Final");
    }

    #[tokio::test]
    async fn test_instance_ordering_nulls_first() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let book_id = seed_book(&db, "Copies", vec![]).await;

        let mut late = NewBookInstance::new(book_id, "Late imprint");
        late.due_back = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut early = NewBookInstance::new(book_id, "Early imprint");
        early.due_back = NaiveDate::from_ymd_opt(2024, 5, 1);
        let undated = NewBookInstance::new(book_id, "Undated imprint");

        insert_book_instance(db.pool(), &late).await.unwrap();
        insert_book_instance(db.pool(), &early).await.unwrap();
        insert_book_instance(db.pool(), &undated).await.unwrap();

        let imprints: Vec<String> = list_book_instances(db.pool())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.instance.imprint)
            .collect();
        assert_eq!(imprints, vec!["Undated imprint", "Early imprint", "Late imprint"]);

        let for_book = instances_for_book(db.pool(), book_id).await.unwrap();
        assert_eq!(for_book[0].imprint, "Undated imprint");
    }

    #[tokio::test]
    async fn test_instance_defaults_and_status_changes() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let book_id = seed_book(&db, "Status", vec![]).await;

        let id = insert_book_instance(db.pool(), &NewBookInstance::new(book_id, "Imprint"))
            .await
            .unwrap();
        let instance = find_book_instance(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(instance.instance_id, id);
        assert_eq!(instance.get_status(), LoanStatus::Maintenance);

        // No transition rules: jump straight from Maintenance to Reserved and back
        set_instance_status(db.pool(), id, LoanStatus::Reserved).await.unwrap();
        set_instance_status(db.pool(), id, LoanStatus::Maintenance).await.unwrap();
        set_instance_status(db.pool(), id, LoanStatus::OnLoan).await.unwrap();
        let instance = find_book_instance(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(instance.get_status(), LoanStatus::OnLoan);

        let mut bad = instance.clone();
        bad.status = "x".to_string();
        assert!(matches!(
            update_book_instance(db.pool(), &bad).await,
            Err(CatalogError::InvalidInput(_))
        ));

        let titled = find_book_instance_with_title(db.pool(), id).await.unwrap().unwrap();
        assert_eq!(titled.to_string(), format!("{} (Status)", id));

        let missing = Uuid::new_v4();
        assert!(set_instance_status(db.pool(), missing, LoanStatus::Available)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_list_books_with_relations() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let author_id = insert_author(db.pool(), &NewAuthor::new("Mary", "Shelley"))
            .await
            .unwrap();
        let gothic = insert_genre(db.pool(), &NewGenre::new("Gothic")).await.unwrap();
        let scifi = insert_genre(db.pool(), &NewGenre::new("Science Fiction")).await.unwrap();

        let mut frankenstein = NewBook::new("Frankenstein", "A creature.", "9780141439471");
        frankenstein.author_id = Some(author_id);
        frankenstein.genre_ids = vec![gothic, scifi];
        insert_book(db.pool(), &frankenstein).await.unwrap();
        seed_book(&db, "Anonymous", vec![]).await;

        let books = list_books_with_relations(db.pool(), 10, 0).await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].book.title, "Anonymous");
        assert_eq!(books[0].author_name, None);
        assert_eq!(books[0].display_genre(), "");
        assert_eq!(books[1].author_name.as_deref(), Some("Shelley, Mary"));
        assert_eq!(books[1].display_genre(), "Gothic, Science Fiction");

        let page = list_books_with_relations(db.pool(), 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].genres.len(), 2);

        let found = search_books_by_title(db.pool(), "frank", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(books_by_author(db.pool(), author_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_title_search_matches_literally() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        seed_book(&db, "The Hobbit", vec![]).await;
        let pure = seed_book(&db, "100% Pure", vec![]).await;
        seed_book(&db, "snake_case Rust", vec![]).await;

        let hits = search_books_by_title(db.pool(), "%", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].book_id, pure);

        let hits = search_books_by_title(db.pool(), "100%", 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = search_books_by_title(db.pool(), "_", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "snake_case Rust");

        let hits = search_books_by_title(db.pool(), "HOBB", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "The Hobbit");
    }

    #[tokio::test]
    async fn test_catalog_stats() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let book_id = seed_book(&db, "Counted", vec![]).await;

        let mut available = NewBookInstance::new(book_id, "A");
        available.status = LoanStatus::Available;
        insert_book_instance(db.pool(), &available).await.unwrap();
        insert_book_instance(db.pool(), &NewBookInstance::new(book_id, "B"))
            .await
            .unwrap();

        let stats = catalog_stats(db.pool()).await.unwrap();
        assert_eq!(
            stats,
            CatalogStats {
                num_books: 1,
                num_instances: 2,
                num_instances_available: 1,
                num_authors: 0,
                num_genres: 0,
            }
        );
    }
}
