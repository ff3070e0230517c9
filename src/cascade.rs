use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::model::{
    DeletedHousehold, CASCADE_FK_DRIFT, DB_ACQUIRE_TIMEOUT, DB_TX_TIMEOUT, HOUSEHOLD_NOT_FOUND,
};
use crate::repo;
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// The cascade may touch a lot of rows, so it gets a bounded connection wait
/// and a transaction budget well above the pool's default busy timeout.
#[derive(Debug, Clone)]
pub struct CascadeDeleteOptions {
    pub acquire_timeout: Duration,
    pub tx_timeout: Duration,
}

impl Default for CascadeDeleteOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
            tx_timeout: Duration::from_secs(30),
        }
    }
}

/// Dependency order: children before parents. The schema also declares
/// ON DELETE CASCADE on every one of these, so a phase missing here cannot
/// corrupt the store — it shows up as a foreign key failure instead, mapped
/// to its own error code below.
const CASCADE_PHASES: &[(&str, &str)] = &[
    (
        "task_assignments",
        "DELETE FROM task_assignments WHERE household_id = ?1",
    ),
    ("tasks", "DELETE FROM tasks WHERE household_id = ?1"),
    (
        "expense_shares",
        "DELETE FROM expense_shares WHERE household_id = ?1",
    ),
    ("expenses", "DELETE FROM expenses WHERE household_id = ?1"),
    (
        "household_rules",
        "DELETE FROM household_rules WHERE household_id = ?1",
    ),
    ("amenities", "DELETE FROM amenities WHERE household_id = ?1"),
    (
        "household_residents",
        "DELETE FROM household_residents WHERE household_id = ?1",
    ),
];

/// Tables the cascade covers, for the registry test that guards against a
/// household-scoped table being added without a matching phase.
pub fn cascade_phase_tables() -> Vec<&'static str> {
    CASCADE_PHASES.iter().map(|(table, _)| *table).collect()
}

fn map_cascade_error(err: sqlx::Error, phase: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let is_fk = db_err.code().as_deref() == Some("787")
            || db_err.message().contains("FOREIGN KEY constraint failed");
        if is_fk {
            return AppError::new(
                CASCADE_FK_DRIFT,
                "Deletion cascade hit a foreign key its phase list does not cover.",
            )
            .with_context("phase", phase.to_string());
        }
    }
    AppError::from(err)
        .with_context("operation", "household_cascade")
        .with_context("phase", phase.to_string())
}

/// Delete a household and everything that structurally depends on it, in one
/// transaction. Returns a minimal snapshot of the removed household so the
/// caller can clean up the external image file.
pub async fn delete_household(
    pool: &SqlitePool,
    household_id: &str,
    options: CascadeDeleteOptions,
) -> AppResult<DeletedHousehold> {
    let record = repo::require_household(pool, household_id).await?;

    let mut tx = match tokio::time::timeout(options.acquire_timeout, pool.begin()).await {
        Err(_) => {
            return Err(AppError::new(
                DB_ACQUIRE_TIMEOUT,
                "Timed out waiting for a database connection.",
            )
            .with_context("household_id", household_id.to_string()))
        }
        Ok(begun) => begun
            .map_err(|err| AppError::from(err).with_context("operation", "household_delete_begin"))?,
    };

    let now = now_ms();
    let household_id_owned = household_id.to_string();
    let work = async move {
        let mut total: u64 = 0;
        for &(table, sql) in CASCADE_PHASES {
            let res = sqlx::query(sql)
                .bind(&household_id_owned)
                .execute(&mut *tx)
                .await
                .map_err(|err| map_cascade_error(err, table))?;
            debug!(
                target: "moradia",
                event = "cascade_phase",
                table = table,
                rows = res.rows_affected()
            );
            total += res.rows_affected();
        }

        // Residency references point at the household about to go.
        sqlx::query(
            "UPDATE users SET residency_household_id = NULL, updated_at = ?1
              WHERE residency_household_id = ?2",
        )
        .bind(now)
        .bind(&household_id_owned)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_cascade_error(err, "users"))?;

        let removed = sqlx::query("DELETE FROM household WHERE id = ?1")
            .bind(&household_id_owned)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_cascade_error(err, "household"))?;
        if removed.rows_affected() == 0 {
            // A concurrent delete won the race after our pre-read.
            return Err(AppError::new(HOUSEHOLD_NOT_FOUND, "Household not found")
                .with_context("household_id", household_id_owned.clone()));
        }
        total += removed.rows_affected();

        tx.commit().await.map_err(|err| {
            AppError::from(err).with_context("operation", "household_delete_commit")
        })?;
        Ok::<u64, AppError>(total)
    };

    let total = match tokio::time::timeout(options.tx_timeout, work).await {
        Ok(res) => res?,
        // The dropped in-flight transaction rolls back; nothing partial survives.
        Err(_) => {
            return Err(AppError::new(DB_TX_TIMEOUT, "Deletion cascade timed out.")
                .with_context("household_id", household_id.to_string()))
        }
    };

    info!(
        target: "moradia",
        event = "household_deleted",
        household_id = %household_id,
        rows = total
    );

    Ok(DeletedHousehold {
        id: record.id,
        name: record.name,
        address: record.address,
        image_ref: record.image_ref,
        rows_deleted: total,
    })
}
