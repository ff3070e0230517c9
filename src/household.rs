use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::info;

use crate::id::new_uuid_v7;
use crate::membership::attach_resident_tx;
use crate::model::{
    Household, HouseholdCreateInput, HouseholdRecord, HouseholdUpdateInput,
    HOUSEHOLD_INVALID_ADDRESS, HOUSEHOLD_INVALID_NAME, HOUSEHOLD_INVALID_RENT,
    HOUSEHOLD_NOT_FOUND, MEMBERSHIP_ALREADY_RESIDENT, MEMBERSHIP_CAPACITY_EXCEEDED,
    MEMBERSHIP_DUPLICATE_RESIDENT, MEMBERSHIP_OWNER_EXCLUSIVE, MAX_RESIDENTS,
};
use crate::repo;
use crate::rule_links::link_rule_tx;
use crate::time::now_ms;
use crate::{AppError, AppResult};

const HOUSEHOLD_COLUMNS: &str =
    "id, name, description, address, rent, image_ref, owner_id, created_at, updated_at";

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::new(
            HOUSEHOLD_INVALID_NAME,
            "Household name is required.",
        ));
    }
    if name.chars().count() > 120 {
        return Err(AppError::new(
            HOUSEHOLD_INVALID_NAME,
            "Household names may be at most 120 characters.",
        )
        .with_context("length", name.chars().count().to_string()));
    }
    Ok(())
}

fn validate_address(address: &str) -> AppResult<()> {
    if address.trim().is_empty() {
        return Err(AppError::new(
            HOUSEHOLD_INVALID_ADDRESS,
            "Household address is required.",
        ));
    }
    Ok(())
}

fn validate_rent(rent: f64) -> AppResult<()> {
    if !rent.is_finite() || rent <= 0.0 {
        return Err(AppError::new(
            HOUSEHOLD_INVALID_RENT,
            "Monthly rent must be greater than zero.",
        )
        .with_context("rent", rent.to_string()));
    }
    Ok(())
}

/// Reject resident lists the store would refuse anyway, before any write:
/// duplicates, the owner itself, more than the cap, unknown users, and users
/// that already reside somewhere (the offenders are reported together).
async fn ensure_residents_assignable(
    pool: &SqlitePool,
    owner_id: &str,
    resident_ids: &[String],
) -> AppResult<()> {
    if resident_ids.is_empty() {
        return Ok(());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for user_id in resident_ids {
        if !seen.insert(user_id.as_str()) {
            return Err(AppError::new(
                MEMBERSHIP_DUPLICATE_RESIDENT,
                "The same user is listed more than once.",
            )
            .with_context("user_id", user_id.clone()));
        }
    }

    if resident_ids.len() as i64 > MAX_RESIDENTS {
        return Err(AppError::new(
            MEMBERSHIP_CAPACITY_EXCEEDED,
            "A household takes at most 4 residents.",
        )
        .with_context("requested", resident_ids.len().to_string()));
    }

    if resident_ids.iter().any(|id| id == owner_id) {
        return Err(AppError::new(
            MEMBERSHIP_OWNER_EXCLUSIVE,
            "The owner cannot be listed as a resident of their own household.",
        )
        .with_context("user_id", owner_id.to_string()));
    }

    let mut already_assigned = Vec::new();
    for user_id in resident_ids {
        let user = repo::require_user(pool, user_id).await?;
        if user.residency_household_id.is_some() {
            already_assigned.push(user_id.clone());
        }
    }
    if !already_assigned.is_empty() {
        return Err(AppError::new(
            MEMBERSHIP_ALREADY_RESIDENT,
            "Some of the proposed residents already reside in a household.",
        )
        .with_context("user_ids", already_assigned.join(",")));
    }

    Ok(())
}

/// Create a household together with its nested tasks, expenses, amenities,
/// initial residents and rule links, in a single transaction. The owner is
/// not attached as a resident; ownership and residency stay independent.
pub async fn create_household(
    pool: &SqlitePool,
    input: HouseholdCreateInput,
) -> AppResult<Household> {
    validate_name(&input.name)?;
    validate_address(&input.address)?;
    validate_rent(input.rent)?;

    repo::require_user(pool, &input.owner_id).await.map_err(|err| {
        err.with_context("operation", "household_create")
            .with_context("role", "owner")
    })?;
    ensure_residents_assignable(pool, &input.owner_id, &input.resident_ids).await?;

    let household_id = new_uuid_v7();
    let now = now_ms();

    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "household_create_begin"))?;

    sqlx::query(
        "INSERT INTO household (id, name, description, address, rent, image_ref, owner_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
    )
    .bind(&household_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.address)
    .bind(input.rent)
    .bind(&input.image_ref)
    .bind(&input.owner_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "household_create_insert")
            .with_context("household_id", household_id.clone())
    })?;

    for task in &input.tasks {
        sqlx::query(
            "INSERT INTO tasks (id, household_id, title, description, due_at, done, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
        )
        .bind(new_uuid_v7())
        .bind(&household_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "household_create_task")
                .with_context("title", task.title.clone())
        })?;
    }

    for expense in &input.expenses {
        sqlx::query(
            "INSERT INTO expenses (id, household_id, description, amount, paid_by, due_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        )
        .bind(new_uuid_v7())
        .bind(&household_id)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.paid_by)
        .bind(expense.due_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "household_create_expense")
                .with_context("description", expense.description.clone())
        })?;
    }

    for amenity in &input.amenities {
        // Nameless amenity specs are skipped rather than rejected.
        if amenity.name.trim().is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT INTO amenities (id, household_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(new_uuid_v7())
        .bind(&household_id)
        .bind(&amenity.name)
        .bind(&amenity.description)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "household_create_amenity")
                .with_context("name", amenity.name.clone())
        })?;
    }

    for user_id in &input.resident_ids {
        attach_resident_tx(&mut tx, &household_id, user_id, now).await?;
    }

    for rule_id in &input.rule_ids {
        link_rule_tx(&mut tx, &household_id, rule_id, now).await?;
    }

    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "household_create_commit"))?;

    info!(
        target: "moradia",
        event = "household_created",
        household_id = %household_id,
        owner_id = %input.owner_id,
        residents = input.resident_ids.len(),
        rules = input.rule_ids.len()
    );

    repo::require_household_view(pool, &household_id).await
}

pub async fn get_household(pool: &SqlitePool, household_id: &str) -> AppResult<Household> {
    repo::require_household_view(pool, household_id).await
}

pub async fn list_households_by_owner(
    pool: &SqlitePool,
    owner_id: &str,
) -> AppResult<Vec<HouseholdRecord>> {
    sqlx::query_as::<_, HouseholdRecord>(&format!(
        "SELECT {HOUSEHOLD_COLUMNS} FROM household WHERE owner_id = ?1 ORDER BY created_at, id"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "household_list_by_owner"))
}

/// Households a user touches, whether as owner or as resident.
pub async fn find_households_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> AppResult<Vec<HouseholdRecord>> {
    sqlx::query_as::<_, HouseholdRecord>(&format!(
        "SELECT {HOUSEHOLD_COLUMNS} FROM household
          WHERE owner_id = ?1
             OR id IN (SELECT residency_household_id FROM users
                        WHERE id = ?1 AND residency_household_id IS NOT NULL)
          ORDER BY created_at, id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "household_find_for_user"))
}

/// Partial update of the household's own columns. Relations are managed by
/// the membership and linker operations, never here.
pub async fn update_household(
    pool: &SqlitePool,
    household_id: &str,
    input: HouseholdUpdateInput,
) -> AppResult<Household> {
    repo::require_household(pool, household_id).await?;

    if let Some(name) = &input.name {
        validate_name(name)?;
    }
    if let Some(address) = &input.address {
        validate_address(address)?;
    }
    if let Some(rent) = input.rent {
        validate_rent(rent)?;
    }

    let now = now_ms();
    let mut sql = String::from("UPDATE household SET updated_at = ?");
    if input.name.is_some() {
        sql.push_str(", name = ?");
    }
    if input.description.is_some() {
        sql.push_str(", description = ?");
    }
    if input.address.is_some() {
        sql.push_str(", address = ?");
    }
    if input.rent.is_some() {
        sql.push_str(", rent = ?");
    }
    if input.image_ref.is_some() {
        sql.push_str(", image_ref = ?");
    }
    sql.push_str(" WHERE id = ?");

    let mut query = sqlx::query(&sql).bind(now);
    if let Some(name) = &input.name {
        query = query.bind(name);
    }
    if let Some(description) = &input.description {
        query = query.bind(description);
    }
    if let Some(address) = &input.address {
        query = query.bind(address);
    }
    if let Some(rent) = input.rent {
        query = query.bind(rent);
    }
    if let Some(image_ref) = &input.image_ref {
        query = query.bind(image_ref);
    }
    let res = query.bind(household_id).execute(pool).await.map_err(|err| {
        AppError::from(err)
            .with_context("operation", "household_update")
            .with_context("household_id", household_id.to_string())
    })?;

    if res.rows_affected() == 0 {
        return Err(AppError::new(HOUSEHOLD_NOT_FOUND, "Household not found")
            .with_context("household_id", household_id.to_string()));
    }

    repo::require_household_view(pool, household_id).await
}
