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


//! Borrower and permission storage operations
//!
//! The catalog only needs users as the target of `BookInstances.borrower_id`;
//! authentication lives elsewhere. Permissions are declared and listed here
//! but never checked.

use crate::error::{CatalogError, Result};
use crate::storage::models::{NewUser, Permission, PermissionDecl, User};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Insert a borrower
///
/// # Errors
/// `IntegrityViolation` (unique) if the username is taken
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    user.validate()?;

    let result = sqlx::query("INSERT INTO Users (username) VALUES (?)")
        .bind(&user.username)
        .execute(pool)
        .await?;

    debug!(user_id = result.last_insert_rowid(), username = %user.username, "inserted user");
    Ok(result.last_insert_rowid())
}

pub async fn find_user_by_id(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM Users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM Users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Delete a borrower
///
/// Copies they had borrowed keep existing with `borrower_id` set to NULL.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM Users WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::not_found(format!("User {}", user_id)));
    }
    info!(user_id, "deleted user");
    Ok(())
}

/// All permissions declared by the schema
pub async fn list_permissions(pool: &SqlitePool) -> Result<Vec<Permission>> {
    let permissions =
        sqlx::query_as::<_, Permission>("SELECT * FROM Permissions ORDER BY codename")
            .fetch_all(pool)
            .await?;

    Ok(permissions)
}

/// Look up the stored row for a declared permission
pub async fn find_permission(pool: &SqlitePool, decl: &PermissionDecl) -> Result<Option<Permission>> {
    let permission = sqlx::query_as::<_, Permission>("SELECT * FROM Permissions WHERE codename = ?")
        .bind(decl.codename)
        .fetch_optional(pool)
        .await?;

    Ok(permission)
}
