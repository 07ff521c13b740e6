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


use anyhow::{bail, Context};
use catalog_core::storage::{queries, users, Database, LoanStatus};
use catalog_core::storage::models::{NewAuthor, NewBook, NewBookInstance, NewGenre, NewLanguage};
use catalog_core::{logging, CatalogConfig};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "catalog-cli")]
#[command(about = "Library catalog CLI - manage the catalog database", long_about = None)]
struct Cli {
    /// Database file (overrides CATALOG_DATABASE_PATH)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply migrations
    Init,
    /// Show catalog counts
    Stats,
    /// Verify integrity and foreign keys, then print storage stats
    Check {
        /// Skip index verification
        #[arg(long)]
        quick: bool,
    },
    /// Refresh planner statistics and reclaim free space
    Compact,
    /// Add a genre
    AddGenre { name: String },
    /// Add a language
    AddLanguage { name: String },
    /// Add an author
    AddAuthor {
        first_name: String,
        last_name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        born: Option<NaiveDate>,
        /// Date of death (YYYY-MM-DD)
        #[arg(long)]
        died: Option<NaiveDate>,
    },
    /// Add a book
    AddBook {
        title: String,
        #[arg(long)]
        summary: String,
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        author: Option<i64>,
        #[arg(long)]
        language: Option<i64>,
        /// Genre id; repeat in the order genres should be listed
        #[arg(long = "genre")]
        genres: Vec<i64>,
    },
    /// Add a physical copy of a book
    AddCopy {
        book_id: i64,
        #[arg(long)]
        imprint: String,
        /// Loan status code or label (m, o, a, r)
        #[arg(long, default_value = "m")]
        status: LoanStatus,
        #[arg(long)]
        due_back: Option<NaiveDate>,
        #[arg(long)]
        borrower: Option<i64>,
    },
    /// Change the loan status of a copy
    SetStatus { instance_id: Uuid, status: LoanStatus },
    /// List authors
    Authors,
    /// List books with author and genres
    Books {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// List copies, soonest due first
    Copies,
    /// Show one book with its copies
    ShowBook { book_id: i64 },
    /// List copies past their due date
    Overdue {
        /// Evaluation date (defaults to today)
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// List declared permissions
    Permissions,
    /// Delete an author (their books are kept)
    DeleteAuthor { author_id: i64 },
    /// Delete a language (its books are kept)
    DeleteLanguage { language_id: i64 },
    /// Delete a book (refused while copies exist)
    DeleteBook { book_id: i64 },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CatalogConfig::from_env().context("Invalid catalog configuration")?;
    if let Some(path) = cli.database {
        config = config.with_database_path(path);
    }
    logging::init_tracing(&config.log_filter);

    let db = Database::with_config(&config)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    let result = run(&db, cli.command).await;
    db.close().await?;
    result
}

async fn run(db: &Database, command: Commands) -> anyhow::Result<()> {
    let pool = db.pool();

    match command {
        Commands::Init => {
            let stats = db.get_stats().await?;
            println!(
                "Catalog ready at {} (schema v{}, {} bytes)",
                db.path().map(|p| p.display().to_string()).unwrap_or_default(),
                stats.schema_version,
                stats.size_bytes
            );
        }
        Commands::Check { quick } => {
            let intact = if quick {
                db.quick_check().await?
            } else {
                db.check_integrity().await?
            };
            let violations = db.foreign_key_violations().await?;
            if !intact || !violations.is_empty() {
                for violation in &violations {
                    eprintln!("{}", violation);
                }
                bail!("Catalog database failed its integrity check");
            }
            print_json(&db.get_stats().await?)?;
        }
        Commands::Compact => {
            let reclaimed = db.compact().await?;
            println!("Reclaimed {} bytes", reclaimed);
        }
        Commands::Stats => print_json(&queries::catalog_stats(pool).await?)?,
        Commands::AddGenre { name } => {
            let id = queries::insert_genre(pool, &NewGenre::new(name)).await?;
            println!("{}", id);
        }
        Commands::AddLanguage { name } => {
            let id = queries::insert_language(pool, &NewLanguage::new(name)).await?;
            println!("{}", id);
        }
        Commands::AddAuthor {
            first_name,
            last_name,
            born,
            died,
        } => {
            let mut author = NewAuthor::new(first_name, last_name);
            author.date_of_birth = born;
            author.date_of_death = died;
            let id = queries::insert_author(pool, &author).await?;
            println!("{}", id);
        }
        Commands::AddBook {
            title,
            summary,
            isbn,
            author,
            language,
            genres,
        } => {
            let mut book = NewBook::new(title, summary, isbn);
            book.author_id = author;
            book.language_id = language;
            book.genre_ids = genres;
            let id = queries::insert_book(pool, &book).await?;
            println!("{}", id);
        }
        Commands::AddCopy {
            book_id,
            imprint,
            status,
            due_back,
            borrower,
        } => {
            let mut copy = NewBookInstance::new(book_id, imprint);
            copy.status = status;
            copy.due_back = due_back;
            copy.borrower_id = borrower;
            let id = queries::insert_book_instance(pool, &copy).await?;
            println!("{}", id);
        }
        Commands::SetStatus {
            instance_id,
            status,
        } => {
            queries::set_instance_status(pool, instance_id, status).await?;
            println!("{} -> {}", instance_id, status);
        }
        Commands::Authors => {
            for author in queries::list_authors(pool).await? {
                println!("{:>5}  {}  {}", author.author_id, author, author.get_absolute_url());
            }
        }
        Commands::Books { limit, offset } => {
            for summary in queries::list_books_with_relations(pool, limit, offset).await? {
                println!(
                    "{:>5}  {}  [{}]  {}",
                    summary.book.book_id,
                    summary.book,
                    summary.display_genre(),
                    summary.author_name.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Copies => {
            for copy in queries::list_book_instances(pool).await? {
                let due = copy
                    .instance
                    .due_back
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let flag = if copy.instance.is_overdue() { " OVERDUE" } else { "" };
                println!("{}  {}  due {}{}", copy, copy.instance.get_status(), due, flag);
            }
        }
        Commands::ShowBook { book_id } => {
            let Some(detail) = queries::find_book_detail(pool, book_id).await? else {
                bail!("Book {} not found", book_id);
            };
            print_json(&serde_json::json!({
                "url": detail.url(),
                "display_genre": detail.display_genre(),
                "detail": detail,
            }))?;
        }
        Commands::Overdue { on } => {
            let today = on.unwrap_or_else(|| Local::now().date_naive());
            print_json(&queries::list_overdue(pool, today).await?)?;
        }
        Commands::Permissions => print_json(&users::list_permissions(pool).await?)?,
        Commands::DeleteAuthor { author_id } => {
            queries::delete_author(pool, author_id).await?;
            println!("Deleted author {}", author_id);
        }
        Commands::DeleteLanguage { language_id } => {
            queries::delete_language(pool, language_id).await?;
            println!("Deleted language {}", language_id);
        }
        Commands::DeleteBook { book_id } => match queries::delete_book(pool, book_id).await {
            Ok(()) => println!("Deleted book {}", book_id),
            Err(e) if e.is_integrity_error() => bail!(e.user_message()),
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}
