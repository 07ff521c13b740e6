//! End-to-end checks of the catalog's deletion policies and derived fields
//!
//! Runs against an in-memory database; each test builds its own catalog.

use catalog_core::storage::models::{
    NewAuthor, NewBook, NewBookInstance, NewGenre, NewLanguage, NewUser,
};
use catalog_core::storage::{queries, users, Database, LoanStatus};
use catalog_core::CatalogError;
use chrono::NaiveDate;

struct Hobbit {
    db: Database,
    author_id: i64,
    language_id: i64,
    book_id: i64,
}

/// Tolkien / The Hobbit / English / Fantasy, with no copies yet
async fn hobbit_catalog() -> Result<Hobbit, CatalogError> {
    let db = Database::new_in_memory().await?;
    let pool = db.pool();

    let author_id = queries::insert_author(pool, &NewAuthor::new("J.R.R.", "Tolkien")).await?;
    let language_id = queries::insert_language(pool, &NewLanguage::new("English")).await?;
    let fantasy = queries::insert_genre(pool, &NewGenre::new("Fantasy")).await?;

    let mut book = NewBook::new(
        "The Hobbit",
        "Bilbo Baggins is swept into a quest to reclaim a dwarven kingdom.",
        "9780261102217",
    );
    book.author_id = Some(author_id);
    book.language_id = Some(language_id);
    book.genre_ids = vec![fantasy];
    let book_id = queries::insert_book(pool, &book).await?;

    Ok(Hobbit {
        db,
        author_id,
        language_id,
        book_id,
    })
}

#[tokio::test]
async fn test_hobbit_scenario() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();

    let mut copy = NewBookInstance::new(catalog.book_id, "Allen & Unwin, 1937");
    copy.status = "a".parse()?;
    let instance_id = queries::insert_book_instance(pool, &copy).await?;

    let detail = queries::find_book_detail(pool, catalog.book_id)
        .await?
        .expect("book should exist");
    assert_eq!(detail.display_genre(), "Fantasy");
    assert_eq!(detail.author.as_ref().map(|a| a.to_string()).as_deref(), Some("Tolkien, J.R.R."));
    assert_eq!(detail.url(), format!("/book/{}", catalog.book_id));
    assert_eq!(detail.instances.len(), 1);

    let instance = queries::find_book_instance(pool, instance_id)
        .await?
        .expect("instance should exist");
    assert_eq!(instance.get_status(), LoanStatus::Available);
    assert!(!instance.is_overdue());

    queries::delete_language(pool, catalog.language_id).await?;
    let book = queries::find_book_by_id(pool, catalog.book_id)
        .await?
        .expect("book must survive language deletion");
    assert_eq!(book.language_id, None);
    assert_eq!(book.author_id, Some(catalog.author_id));

    Ok(())
}

#[tokio::test]
async fn test_deleting_author_keeps_books() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();

    assert_eq!(queries::books_by_author(pool, catalog.author_id).await?.len(), 1);

    queries::delete_author(pool, catalog.author_id).await?;

    let book = queries::find_book_by_id(pool, catalog.book_id)
        .await?
        .expect("book must survive author deletion");
    assert_eq!(book.author_id, None);
    assert_eq!(book.language_id, Some(catalog.language_id));
    assert!(queries::find_book_detail(pool, catalog.book_id)
        .await?
        .expect("book should exist")
        .author
        .is_none());

    Ok(())
}

#[tokio::test]
async fn test_deleting_book_with_copies_is_restricted() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();

    let instance_id =
        queries::insert_book_instance(pool, &NewBookInstance::new(catalog.book_id, "Reprint"))
            .await?;

    let err = queries::delete_book(pool, catalog.book_id).await.unwrap_err();
    assert!(
        matches!(err, CatalogError::DeleteRestricted { ref entity, .. } if entity == "Book"),
        "unexpected error: {err:?}"
    );

    // Both records intact, genre association untouched
    assert!(queries::find_book_by_id(pool, catalog.book_id).await?.is_some());
    assert!(queries::find_book_instance(pool, instance_id).await?.is_some());
    assert_eq!(queries::display_genre_for_book(pool, catalog.book_id).await?, "Fantasy");

    // Once the copy is gone the book can be deleted, taking its genre links with it
    queries::delete_book_instance(pool, instance_id).await?;
    queries::delete_book(pool, catalog.book_id).await?;
    assert!(queries::find_book_by_id(pool, catalog.book_id).await?.is_none());

    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM BookGenres")
        .fetch_one(pool)
        .await?;
    assert_eq!(links, 0);

    Ok(())
}

#[tokio::test]
async fn test_display_genre_caps_at_three() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();

    for name in ["Adventure", "Children's", "Classic"] {
        let id = queries::insert_genre(pool, &NewGenre::new(name)).await?;
        queries::add_book_genre(pool, catalog.book_id, id).await?;
    }

    assert_eq!(queries::genres_for_book(pool, catalog.book_id).await?.len(), 4);
    assert_eq!(
        queries::display_genre_for_book(pool, catalog.book_id).await?,
        "Fantasy, Adventure, Children's"
    );

    Ok(())
}

#[tokio::test]
async fn test_overdue_listing_matches_derived_flag() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

    let borrower = users::insert_user(pool, &NewUser::new("bilbo")).await?;
    let mut ids = Vec::new();
    for (imprint, due) in [
        ("past", NaiveDate::from_ymd_opt(2024, 3, 9)),
        ("today", Some(today)),
        ("future", NaiveDate::from_ymd_opt(2024, 3, 11)),
        ("none", None),
    ] {
        let mut copy = NewBookInstance::new(catalog.book_id, imprint);
        copy.status = LoanStatus::OnLoan;
        copy.due_back = due;
        copy.borrower_id = Some(borrower);
        ids.push(queries::insert_book_instance(pool, &copy).await?);
    }

    let overdue = queries::list_overdue(pool, today).await?;
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].instance.imprint, "past");
    assert_eq!(overdue[0].book_title.as_deref(), Some("The Hobbit"));

    for id in &ids {
        let instance = queries::find_book_instance(pool, *id).await?.expect("instance");
        assert_eq!(instance.is_overdue_on(today), instance.imprint == "past");
    }

    let loaned = queries::loaned_instances_for_borrower(pool, borrower).await?;
    let imprints: Vec<&str> = loaned.iter().map(|c| c.instance.imprint.as_str()).collect();
    assert_eq!(imprints, vec!["none", "past", "today", "future"]);
    assert_eq!(queries::list_on_loan(pool).await?.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_constraint_violations_are_rejected() -> Result<(), CatalogError> {
    let catalog = hobbit_catalog().await?;
    let pool = catalog.db.pool();

    let err = queries::insert_genre(pool, &NewGenre::new("")).await.unwrap_err();
    assert!(matches!(err, CatalogError::MissingRequiredField(_)));

    let err = queries::insert_book(pool, &NewBook::new("t", "s", "12345678901234"))
        .await
        .unwrap_err();
    assert!(err.is_integrity_error());

    // Bypassing validation still hits the schema constraints
    let copy = queries::insert_book_instance(pool, &NewBookInstance::new(catalog.book_id, "x")).await?;
    let raw = sqlx::query("UPDATE BookInstances SET status = 'z' WHERE instance_id = ?")
        .bind(copy)
        .execute(pool)
        .await
        .map_err(CatalogError::from)
        .unwrap_err();
    assert!(raw.is_integrity_error(), "unexpected error: {raw:?}");

    let mut orphan = NewBookInstance::new(987_654, "Orphan");
    orphan.status = LoanStatus::Reserved;
    let err = queries::insert_book_instance(pool, &orphan).await.unwrap_err();
    assert!(err.is_foreign_key_violation());

    Ok(())
}
