use sqlx::SqlitePool;

use crate::id::new_uuid_v7;
use crate::model::{Amenity, AmenityInput, AMENITY_INVALID_NAME, AMENITY_NOT_FOUND};
use crate::repo;
use crate::time::now_ms;
use crate::{AppError, AppResult};

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            AMENITY_INVALID_NAME,
            "Amenity name is required.",
        ));
    }
    Ok(())
}

/// Attach an amenity to a household. Amenities are owned by exactly one
/// household; there is no sharing or re-parenting.
pub async fn add_amenity(
    pool: &SqlitePool,
    household_id: &str,
    input: AmenityInput,
) -> AppResult<Amenity> {
    validate_name(&input.name)?;
    repo::require_household(pool, household_id).await?;

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO amenities (id, household_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "amenities_add")
            .with_context("household_id", household_id.to_string())
    })?;

    sqlx::query_as::<_, Amenity>(
        "SELECT id, household_id, name, description, created_at, updated_at
           FROM amenities WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "amenities_add_fetch")
            .with_context("amenity_id", id.clone())
    })
}

pub async fn remove_amenity(pool: &SqlitePool, amenity_id: &str) -> AppResult<()> {
    let rows = sqlx::query("DELETE FROM amenities WHERE id = ?1")
        .bind(amenity_id)
        .execute(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "amenities_remove")
                .with_context("amenity_id", amenity_id.to_string())
        })?;

    if rows.rows_affected() == 0 {
        return Err(AppError::new(AMENITY_NOT_FOUND, "Amenity not found")
            .with_context("amenity_id", amenity_id.to_string()));
    }
    Ok(())
}

pub async fn list_amenities(pool: &SqlitePool, household_id: &str) -> AppResult<Vec<Amenity>> {
    repo::require_household(pool, household_id).await?;
    repo::amenities_of(pool, household_id).await
}
