use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::id::new_uuid_v7;
use crate::model::{
    Rule, RuleCreateInput, RuleLink, RULES_DUPLICATE_LINK, RULES_INVALID_TITLE, RULES_NOT_FOUND,
};
use crate::repo;
use crate::time::now_ms;
use crate::{AppError, AppResult};

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::new(RULES_INVALID_TITLE, "Rule title is required."));
    }
    Ok(())
}

/// Add a rule definition to the shared catalog households link against.
pub async fn create_rule(pool: &SqlitePool, input: RuleCreateInput) -> AppResult<Rule> {
    validate_title(&input.title)?;

    let id = new_uuid_v7();
    let now = now_ms();
    sqlx::query(
        "INSERT INTO rules (id, title, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
    )
    .bind(&id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "rules_create"))?;

    sqlx::query_as::<_, Rule>(
        "SELECT id, title, description, created_at, updated_at FROM rules WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "rules_create_fetch"))
}

pub async fn list_rules(pool: &SqlitePool) -> AppResult<Vec<Rule>> {
    sqlx::query_as::<_, Rule>(
        "SELECT id, title, description, created_at, updated_at FROM rules ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "rules_list"))
}

async fn ensure_rule_exists(
    tx: &mut Transaction<'_, Sqlite>,
    rule_id: &str,
) -> AppResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM rules WHERE id = ?1")
        .bind(rule_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;
    if found.is_none() {
        return Err(AppError::new(RULES_NOT_FOUND, "Rule not found")
            .with_context("rule_id", rule_id.to_string()));
    }
    Ok(())
}

/// Insert one household↔rule link. The (household, rule) pair is unique;
/// the store's UNIQUE violation is translated into a domain conflict instead
/// of leaking raw sqlite text.
pub(crate) async fn link_rule_tx(
    tx: &mut Transaction<'_, Sqlite>,
    household_id: &str,
    rule_id: &str,
    now: i64,
) -> AppResult<RuleLink> {
    ensure_rule_exists(tx, rule_id).await?;

    let id = new_uuid_v7();
    let insert_result = sqlx::query(
        "INSERT INTO household_rules (id, household_id, rule_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&id)
    .bind(household_id)
    .bind(rule_id)
    .bind(now)
    .execute(&mut **tx)
    .await;

    if let Err(err) = insert_result {
        if let sqlx::Error::Database(db_err) = &err {
            let is_unique = db_err.code().as_deref() == Some("2067")
                || db_err.message().starts_with("UNIQUE constraint failed");
            if is_unique {
                return Err(AppError::new(
                    RULES_DUPLICATE_LINK,
                    "Rule is already linked to this household.",
                )
                .with_context("household_id", household_id.to_string())
                .with_context("rule_id", rule_id.to_string()));
            }
        }
        return Err(AppError::from(err)
            .with_context("operation", "rule_links_create")
            .with_context("household_id", household_id.to_string())
            .with_context("rule_id", rule_id.to_string()));
    }

    sqlx::query_as::<_, RuleLink>(
        "SELECT id, household_id, rule_id, created_at FROM household_rules WHERE id = ?1",
    )
    .bind(&id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|err| {
        AppError::from(err)
            .with_context("operation", "rule_links_create_fetch")
            .with_context("link_id", id.clone())
    })
}

pub async fn link_rule(
    pool: &SqlitePool,
    household_id: &str,
    rule_id: &str,
) -> AppResult<RuleLink> {
    repo::require_household(pool, household_id).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "rule_links_create_tx"))?;
    let link = link_rule_tx(&mut tx, household_id, rule_id, now_ms()).await?;
    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "rule_links_create_commit"))?;

    tracing::debug!(
        target = "moradia",
        action = "link_rule",
        link_id = %link.id,
        household_id = %household_id,
        rule_id = %rule_id
    );
    Ok(link)
}

/// Remove a household↔rule link. Unlinking a pair that is not linked is a
/// no-op, not an error; callers get the affected row count.
pub async fn unlink_rule(pool: &SqlitePool, household_id: &str, rule_id: &str) -> AppResult<u64> {
    repo::require_household(pool, household_id).await?;

    let rows = sqlx::query("DELETE FROM household_rules WHERE household_id = ?1 AND rule_id = ?2")
        .bind(household_id)
        .bind(rule_id)
        .execute(pool)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "rule_links_delete")
                .with_context("household_id", household_id.to_string())
                .with_context("rule_id", rule_id.to_string())
        })?;

    tracing::debug!(
        target = "moradia",
        action = "unlink_rule",
        household_id = %household_id,
        rule_id = %rule_id,
        rows = rows.rows_affected()
    );
    Ok(rows.rows_affected())
}
