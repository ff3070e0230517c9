use sqlx::{Executor, Sqlite, SqlitePool};

use crate::model::{
    Amenity, Household, HouseholdRecord, RuleLink, User, HOUSEHOLD_NOT_FOUND, USER_NOT_FOUND,
};
use crate::{AppError, AppResult};

const HOUSEHOLD_COLUMNS: &str =
    "id, name, description, address, rent, image_ref, owner_id, created_at, updated_at";
const USER_COLUMNS: &str =
    "id, display_name, email, residency_household_id, created_at, updated_at";

pub async fn household_record<'e, E>(
    executor: E,
    household_id: &str,
) -> AppResult<Option<HouseholdRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, HouseholdRecord>(&format!(
        "SELECT {HOUSEHOLD_COLUMNS} FROM household WHERE id = ?1"
    ))
    .bind(household_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn require_household<'e, E>(executor: E, household_id: &str) -> AppResult<HouseholdRecord>
where
    E: Executor<'e, Database = Sqlite>,
{
    household_record(executor, household_id).await?.ok_or_else(|| {
        AppError::new(HOUSEHOLD_NOT_FOUND, "Household not found")
            .with_context("household_id", household_id.to_string())
    })
}

pub async fn user_record<'e, E>(executor: E, user_id: &str) -> AppResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn require_user<'e, E>(executor: E, user_id: &str) -> AppResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    user_record(executor, user_id).await?.ok_or_else(|| {
        AppError::new(USER_NOT_FOUND, "User not found")
            .with_context("user_id", user_id.to_string())
    })
}

pub async fn resident_count<'e, E>(executor: E, household_id: &str) -> AppResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM household_residents WHERE household_id = ?1")
        .bind(household_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn residents_of<'e, E>(executor: E, household_id: &str) -> AppResult<Vec<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.display_name, u.email, u.residency_household_id, u.created_at, u.updated_at
           FROM household_residents hr
           JOIN users u ON u.id = hr.user_id
          WHERE hr.household_id = ?1
          ORDER BY hr.joined_at, u.id",
    )
    .bind(household_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn amenities_of<'e, E>(executor: E, household_id: &str) -> AppResult<Vec<Amenity>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Amenity>(
        "SELECT id, household_id, name, description, created_at, updated_at
           FROM amenities
          WHERE household_id = ?1
          ORDER BY created_at, id",
    )
    .bind(household_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn rule_links_of<'e, E>(executor: E, household_id: &str) -> AppResult<Vec<RuleLink>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, RuleLink>(
        "SELECT id, household_id, rule_id, created_at
           FROM household_rules
          WHERE household_id = ?1
          ORDER BY created_at, id",
    )
    .bind(household_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Resolve a flat household row into the nested shape the transport hands
/// out: owner, residents, amenities and rule links.
pub async fn household_view(pool: &SqlitePool, record: HouseholdRecord) -> AppResult<Household> {
    let owner = require_user(pool, &record.owner_id).await?;
    let residents = residents_of(pool, &record.id).await?;
    let amenities = amenities_of(pool, &record.id).await?;
    let rule_links = rule_links_of(pool, &record.id).await?;

    Ok(Household {
        id: record.id,
        name: record.name,
        description: record.description,
        address: record.address,
        rent: record.rent,
        image_ref: record.image_ref,
        owner,
        residents,
        amenities,
        rule_links,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

/// Fetch the nested view for a household that must exist.
pub async fn require_household_view(pool: &SqlitePool, household_id: &str) -> AppResult<Household> {
    let record = require_household(pool, household_id).await?;
    household_view(pool, record).await
}
