use anyhow::Result;
use futures::FutureExt;
use moradia::db::{open_sqlite_pool, run_in_tx};
use moradia::{create_user, migrate, UserCreateInput};
use sqlx::sqlite::SqlitePoolOptions;

#[tokio::test]
async fn file_backed_pool_applies_the_expected_pragmas() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = open_sqlite_pool(&dir.path().join("moradia.sqlite3")).await?;

    let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(&pool)
        .await?;
    assert!(journal_mode.eq_ignore_ascii_case("wal"));
    let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(&pool)
        .await?;
    assert_eq!(foreign_keys, 1);

    migrate::apply_migrations(&pool).await?;
    // Re-applying is a no-op thanks to the checksummed version table.
    migrate::apply_migrations(&pool).await?;

    let user = create_user(
        &pool,
        UserCreateInput {
            display_name: "Ana".into(),
            email: None,
        },
    )
    .await?;
    assert!(user.residency_household_id.is_none());
    Ok(())
}

#[tokio::test]
async fn run_in_tx_commits_on_success_and_rolls_back_on_error() -> Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::query("CREATE TABLE t (val TEXT UNIQUE);")
        .execute(&pool)
        .await?;

    run_in_tx::<_, sqlx::Error, _>(&pool, |tx| {
        async move {
            sqlx::query("INSERT INTO t (val) VALUES ('ok');")
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
        .boxed()
    })
    .await?;

    let res = run_in_tx::<_, sqlx::Error, _>(&pool, |tx| {
        async move {
            sqlx::query("INSERT INTO t (val) VALUES ('dup');")
                .execute(&mut **tx)
                .await?;
            sqlx::query("INSERT INTO t (val) VALUES ('dup');")
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
        .boxed()
    })
    .await;
    assert!(res.is_err(), "unique violation must fail the transaction");

    let vals: Vec<String> = sqlx::query_scalar("SELECT val FROM t ORDER BY val")
        .fetch_all(&pool)
        .await?;
    assert_eq!(vals, vec!["ok".to_string()], "failed tx left nothing behind");
    Ok(())
}
