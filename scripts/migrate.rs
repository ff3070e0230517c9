use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migrate", about = "Apply the moradia schema migrations")]
struct Cli {
    /// Database path; falls back to MORADIA_DB, then ./moradia.sqlite3
    #[arg(long, value_name = "PATH", env = "MORADIA_DB", default_value = "moradia.sqlite3")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    moradia::logging::init();
    let cli = Cli::parse();

    let pool = moradia::db::open_sqlite_pool(&cli.db).await?;
    moradia::migrate::apply_migrations(&pool).await?;

    tracing::info!(
        target: "moradia",
        event = "migrations_applied",
        db = %cli.db.display()
    );
    Ok(())
}
