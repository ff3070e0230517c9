use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{User, UserCreateInput, USER_EMAIL_TAKEN, USER_INVALID_NAME};
use crate::repo;
use crate::time::now_ms;
use crate::{AppError, AppResult};

fn map_user_insert_error(err: sqlx::Error, email: Option<&str>) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let is_unique = db_err.code().as_deref() == Some("2067")
            || db_err.message().starts_with("UNIQUE constraint failed");
        if is_unique {
            return AppError::new(USER_EMAIL_TAKEN, "That email address is already in use.")
                .with_context("email", email.unwrap_or_default().to_string());
        }
    }
    AppError::from(err).with_context("operation", "users_create")
}

/// Provision a user row. Authentication lives elsewhere; the core only needs
/// the identity and the (initially empty) residency reference.
pub async fn create_user(pool: &SqlitePool, input: UserCreateInput) -> AppResult<User> {
    if input.display_name.trim().is_empty() {
        return Err(AppError::new(
            USER_INVALID_NAME,
            "A display name is required.",
        ));
    }

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO users (id, display_name, email, residency_household_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, NULL, ?4, ?4)",
    )
    .bind(&id)
    .bind(&input.display_name)
    .bind(&input.email)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| map_user_insert_error(err, input.email.as_deref()))?;

    repo::require_user(pool, &id).await
}

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> AppResult<User> {
    repo::require_user(pool, user_id).await
}
