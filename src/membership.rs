use futures::FutureExt;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::db::run_in_tx;
use crate::id::new_uuid_v7;
use crate::model::{
    Household, MEMBERSHIP_ALREADY_RESIDENT, MEMBERSHIP_CAPACITY_EXCEEDED,
    MEMBERSHIP_DUPLICATE_RESIDENT, MEMBERSHIP_NOT_RESIDENT, MEMBERSHIP_OWNER_EXCLUSIVE,
    MAX_RESIDENTS,
};
use crate::repo;
use crate::time::now_ms;
use crate::{AppError, AppResult};

fn map_relation_insert_error(err: sqlx::Error, user_id: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let is_unique = db_err.code().as_deref() == Some("2067")
            || db_err.message().starts_with("UNIQUE constraint failed");
        if is_unique {
            // The schema-level UNIQUE on user_id caught a racing writer.
            return AppError::new(
                MEMBERSHIP_DUPLICATE_RESIDENT,
                "User is already attached to a household.",
            )
            .with_context("user_id", user_id.to_string());
        }
    }
    AppError::from(err)
        .with_context("operation", "resident_attach")
        .with_context("user_id", user_id.to_string())
}

/// Claim the user's residency reference and insert the relation row. Both
/// writes are conditional so concurrent callers cannot overshoot the cap or
/// double-assign a user, whatever the pre-checks saw.
pub(crate) async fn attach_resident_tx(
    tx: &mut Transaction<'_, Sqlite>,
    household_id: &str,
    user_id: &str,
    now: i64,
) -> AppResult<()> {
    let claimed = sqlx::query(
        "UPDATE users SET residency_household_id = ?1, updated_at = ?2
          WHERE id = ?3 AND residency_household_id IS NULL",
    )
    .bind(household_id)
    .bind(now)
    .bind(user_id)
    .execute(&mut **tx)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "resident_claim")
            .with_context("user_id", user_id.to_string())
    })?;
    if claimed.rows_affected() == 0 {
        return Err(AppError::new(
            MEMBERSHIP_ALREADY_RESIDENT,
            "User already resides in a household.",
        )
        .with_context("user_id", user_id.to_string()));
    }

    let related = sqlx::query(
        "INSERT INTO household_residents (id, household_id, user_id, joined_at)
         SELECT ?1, ?2, ?3, ?4
          WHERE (SELECT COUNT(*) FROM household_residents WHERE household_id = ?2) < ?5",
    )
    .bind(new_uuid_v7())
    .bind(household_id)
    .bind(user_id)
    .bind(now)
    .bind(MAX_RESIDENTS)
    .execute(&mut **tx)
    .await
    .map_err(|err| map_relation_insert_error(err, user_id))?;
    if related.rows_affected() == 0 {
        return Err(AppError::new(
            MEMBERSHIP_CAPACITY_EXCEEDED,
            "Household already has 4 residents.",
        )
        .with_context("household_id", household_id.to_string()));
    }

    Ok(())
}

/// Attach a user to a household as a resident.
///
/// The preconditions run in a fixed order so callers get the most specific
/// error first; the writes re-enforce the capacity and single-residency
/// invariants on their own (see `attach_resident_tx`).
pub async fn add_resident(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
) -> AppResult<Household> {
    let household = repo::require_household(pool, household_id).await?;

    let count = repo::resident_count(pool, household_id).await?;
    if count >= MAX_RESIDENTS {
        return Err(AppError::new(
            MEMBERSHIP_CAPACITY_EXCEEDED,
            "Household already has 4 residents.",
        )
        .with_context("household_id", household_id.to_string())
        .with_context("residents", count.to_string()));
    }

    let user = repo::require_user(pool, user_id).await?;

    if household.owner_id == user_id {
        return Err(AppError::new(
            MEMBERSHIP_OWNER_EXCLUSIVE,
            "The owner cannot be a resident of their own household.",
        )
        .with_context("household_id", household_id.to_string())
        .with_context("user_id", user_id.to_string()));
    }

    if let Some(current) = &user.residency_household_id {
        return Err(AppError::new(
            MEMBERSHIP_ALREADY_RESIDENT,
            "User already resides in a household.",
        )
        .with_context("user_id", user_id.to_string())
        .with_context("residency_household_id", current.clone()));
    }

    // Kept alongside the residency check above: a stale relation row with a
    // cleared residency column would otherwise slip through.
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM household_residents WHERE household_id = ?1 AND user_id = ?2",
    )
    .bind(household_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?;
    if existing.is_some() {
        return Err(AppError::new(
            MEMBERSHIP_DUPLICATE_RESIDENT,
            "User is already a resident of this household.",
        )
        .with_context("household_id", household_id.to_string())
        .with_context("user_id", user_id.to_string()));
    }

    let now = now_ms();
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "resident_add_begin"))?;
    attach_resident_tx(&mut tx, household_id, user_id, now).await?;
    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "resident_add_commit"))?;

    info!(
        target: "moradia",
        event = "resident_added",
        household_id = %household_id,
        user_id = %user_id
    );

    repo::require_household_view(pool, household_id).await
}

/// Detach a resident: clears the residency reference and removes the
/// relation row in one transaction.
pub async fn remove_resident(
    pool: &SqlitePool,
    household_id: &str,
    user_id: &str,
) -> AppResult<Household> {
    repo::require_household(pool, household_id).await?;
    let user = repo::require_user(pool, user_id).await?;

    let related: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM household_residents WHERE household_id = ?1 AND user_id = ?2",
    )
    .bind(household_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?;
    let resides_here = user.residency_household_id.as_deref() == Some(household_id);
    if related.is_none() && !resides_here {
        return Err(AppError::new(
            MEMBERSHIP_NOT_RESIDENT,
            "User is not a resident of this household.",
        )
        .with_context("household_id", household_id.to_string())
        .with_context("user_id", user_id.to_string()));
    }

    let now = now_ms();
    let household_id_owned = household_id.to_string();
    let user_id_owned = user_id.to_string();
    run_in_tx::<_, sqlx::Error, _>(pool, |tx| {
        async move {
            sqlx::query(
                "UPDATE users SET residency_household_id = NULL, updated_at = ?1
                  WHERE id = ?2 AND residency_household_id = ?3",
            )
            .bind(now)
            .bind(&user_id_owned)
            .bind(&household_id_owned)
            .execute(&mut **tx)
            .await?;
            sqlx::query("DELETE FROM household_residents WHERE household_id = ?1 AND user_id = ?2")
                .bind(&household_id_owned)
                .bind(&user_id_owned)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
        .boxed()
    })
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "resident_remove")
            .with_context("household_id", household_id.to_string())
            .with_context("user_id", user_id.to_string())
    })?;

    info!(
        target: "moradia",
        event = "resident_removed",
        household_id = %household_id,
        user_id = %user_id
    );

    repo::require_household_view(pool, household_id).await
}
