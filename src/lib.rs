//! Library catalog core
//!
//! Schema, storage and derived accessors for a small library catalog:
//! genres, languages, authors, books and the physical copies that get
//! lent out. See [`storage`] for the data model and queries.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use storage::Database;
