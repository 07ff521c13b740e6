//! Database models for the library catalog
//!
//! Record types for the five catalog entities plus the borrower user, the
//! insert/update structs that carry field validation, and the derived
//! read-only accessors (display strings, locators, `display_genre`,
//! `is_overdue`).
//!
//! # SQLite Adaptations
//! - Dates stored as TEXT in ISO 8601 format (`YYYY-MM-DD`)
//! - Loan status stored as its one-character code
//! - Book instance ids stored as 16-byte UUID blobs
//! - Book <-> Genre many-to-many uses the `BookGenres` junction table

use crate::error::{CatalogError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// FIELD LIMITS
// ============================================================================

pub const GENRE_NAME_MAX: usize = 200;
pub const LANGUAGE_NAME_MAX: usize = 200;
pub const AUTHOR_NAME_MAX: usize = 100;
pub const BOOK_TITLE_MAX: usize = 200;
pub const BOOK_SUMMARY_MAX: usize = 1000;
pub const BOOK_ISBN_MAX: usize = 13;
pub const IMPRINT_MAX: usize = 200;
pub const USERNAME_MAX: usize = 150;

/// How many genre names `display_genre` shows
pub const DISPLAY_GENRE_LIMIT: usize = 3;

/// Column label for `display_genre` in listings
pub const DISPLAY_GENRE_LABEL: &str = "Genre";

/// Label for `Author::date_of_death`
pub const DATE_OF_DEATH_LABEL: &str = "Died";

/// Check a required text field: non-empty (after trimming) and within `max` characters
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::MissingRequiredField(field.to_string()));
    }
    let actual = value.chars().count();
    if actual > max {
        return Err(CatalogError::FieldTooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

// ============================================================================
// ENUMS
// ============================================================================

/// Availability of a physical copy
///
/// No transition rules: any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoanStatus {
    #[default]
    Maintenance,
    OnLoan,
    Available,
    Reserved,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Maintenance,
        LoanStatus::OnLoan,
        LoanStatus::Available,
        LoanStatus::Reserved,
    ];

    /// Stored one-character code
    pub fn code(&self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "m",
            LoanStatus::OnLoan => "o",
            LoanStatus::Available => "a",
            LoanStatus::Reserved => "r",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Maintenance => "Maintenance",
            LoanStatus::OnLoan => "On Loan",
            LoanStatus::Available => "Available",
            LoanStatus::Reserved => "Reserved",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(LoanStatus::Maintenance),
            "o" => Some(LoanStatus::OnLoan),
            "a" => Some(LoanStatus::Available),
            "r" => Some(LoanStatus::Reserved),
            _ => None,
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = CatalogError;

    /// Accepts either the stored code (`"o"`) or the label (`"On Loan"`, case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(status) = LoanStatus::from_code(trimmed) {
            return Ok(status);
        }
        LoanStatus::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CatalogError::invalid_input(format!("Unknown loan status: {:?}", s)))
    }
}

// ============================================================================
// PERMISSIONS
// ============================================================================

/// A named permission declared by the schema
///
/// Enforcement belongs to whatever authorization layer sits in front of the
/// catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionDecl {
    pub codename: &'static str,
    pub name: &'static str,
    /// Table the permission is attached to
    pub content_type: &'static str,
}

pub const CAN_MARK_RETURNED: PermissionDecl = PermissionDecl {
    codename: "can_mark_returned",
    name: "Set book as returned",
    content_type: "BookInstances",
};

/// Permission row as stored in the `Permissions` table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub permission_id: i64,
    pub codename: String,
    pub name: String,
    pub content_type: String,
}

// ============================================================================
// MAIN ENTITIES
// ============================================================================

/// Book genre (e.g. Science Fiction)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub genre_id: i64,
    pub name: String,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Natural language of a book (e.g. English, French, Japanese)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub language_id: i64,
    pub name: String,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub author_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[sqlx(default)]
    pub date_of_death: Option<NaiveDate>,
}

impl Author {
    /// Locator for the author's detail view
    pub fn get_absolute_url(&self) -> String {
        format!("/author/{}", self.author_id)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

/// Catalog title record (not a specific copy)
///
/// `author_id` and `language_id` are nulled by the storage layer when the
/// referenced row is deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub book_id: i64,
    pub title: String,
    #[sqlx(default)]
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
    #[sqlx(default)]
    pub language_id: Option<i64>,
}

impl Book {
    /// Locator for the book's detail view
    pub fn get_absolute_url(&self) -> String {
        format!("/book/{}", self.book_id)
    }

    /// First three genre names joined by ", "
    ///
    /// `genres` must be in association order, as returned by
    /// `queries::genres_for_book`.
    pub fn display_genre(&self, genres: &[Genre]) -> String {
        display_genre(genres.iter().map(|g| g.name.as_str()))
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Join at most [`DISPLAY_GENRE_LIMIT`] names with ", "
pub fn display_genre<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .take(DISPLAY_GENRE_LIMIT)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One physical, loanable copy of a book
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookInstance {
    /// Unique across the whole library, generated at creation
    pub instance_id: Uuid,
    #[sqlx(default)]
    pub book_id: Option<i64>,
    pub imprint: String,
    #[sqlx(default)]
    pub due_back: Option<NaiveDate>,
    pub status: String, // LoanStatus code
    #[sqlx(default)]
    pub borrower_id: Option<i64>,
}

impl BookInstance {
    /// Get status as enum
    ///
    /// The schema's CHECK constraint only admits known codes, so the
    /// fallback is never hit for rows read from the database.
    pub fn get_status(&self) -> LoanStatus {
        LoanStatus::from_code(&self.status).unwrap_or_default()
    }

    /// Overdue relative to today's local date
    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(Local::now().date_naive())
    }

    /// True iff `due_back` is set and strictly before `today`
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        matches!(self.due_back, Some(due) if due < today)
    }

    /// Display string given the title of the referenced book
    pub fn display_with_title(&self, book_title: Option<&str>) -> String {
        match book_title {
            Some(title) => format!("{} ({})", self.instance_id, title),
            None => self.instance_id.to_string(),
        }
    }
}

/// Book instance joined with its book's title
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookInstanceWithTitle {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub instance: BookInstance,
    #[sqlx(default)]
    pub book_title: Option<String>,
}

impl fmt::Display for BookInstanceWithTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.instance.display_with_title(self.book_title.as_deref()))
    }
}

/// Borrower account
///
/// Minimal stand-in for the user entity owned by the authentication layer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

// ============================================================================
// NEW RECORD STRUCTS (for inserts)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGenre {
    pub name: String,
}

impl NewGenre {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name, GENRE_NAME_MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLanguage {
    pub name: String,
}

impl NewLanguage {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name, LANGUAGE_NAME_MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl NewAuthor {
    pub fn new<F: Into<String>, L: Into<String>>(first_name: F, last_name: L) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: None,
            date_of_death: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("first_name", &self.first_name, AUTHOR_NAME_MAX)?;
        require_text("last_name", &self.last_name, AUTHOR_NAME_MAX)
    }
}

/// New book record for insertion
///
/// `genre_ids` order becomes the association order used by `display_genre`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author_id: Option<i64>,
    pub summary: String,
    pub isbn: String,
    pub language_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

impl NewBook {
    pub fn new<T, S, I>(title: T, summary: S, isbn: I) -> Self
    where
        T: Into<String>,
        S: Into<String>,
        I: Into<String>,
    {
        Self {
            title: title.into(),
            author_id: None,
            summary: summary.into(),
            isbn: isbn.into(),
            language_id: None,
            genre_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_book_fields(&self.title, &self.summary, &self.isbn)
    }
}

pub(crate) fn validate_book_fields(title: &str, summary: &str, isbn: &str) -> Result<()> {
    require_text("title", title, BOOK_TITLE_MAX)?;
    require_text("summary", summary, BOOK_SUMMARY_MAX)?;
    require_text("isbn", isbn, BOOK_ISBN_MAX)
}

/// New book instance record for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookInstance {
    pub book_id: Option<i64>,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub status: LoanStatus,
    pub borrower_id: Option<i64>,
}

impl NewBookInstance {
    pub fn new<S: Into<String>>(book_id: i64, imprint: S) -> Self {
        Self {
            book_id: Some(book_id),
            imprint: imprint.into(),
            due_back: None,
            status: LoanStatus::default(),
            borrower_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("imprint", &self.imprint, IMPRINT_MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
}

impl NewUser {
    pub fn new<S: Into<String>>(username: S) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("username", &self.username, USERNAME_MAX)
    }
}
