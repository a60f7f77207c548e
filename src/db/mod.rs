//! Database module.
//!
//! SQLite is the source of truth in production; the in-memory store serves
//! tests and throwaway environments.

mod memory;
mod repository;
mod store;

pub use memory::InMemoryStore;
pub use repository::Repository;
pub use store::ReviewStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            team_name TEXT NOT NULL REFERENCES teams(team_name),
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pull_requests (
            pull_request_id TEXT PRIMARY KEY,
            pull_request_name TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES users(user_id),
            status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'MERGED')),
            created_at TEXT NOT NULL,
            merged_at TEXT,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pull_request_reviewers (
            pull_request_id TEXT NOT NULL REFERENCES pull_requests(pull_request_id),
            reviewer_id TEXT NOT NULL REFERENCES users(user_id),
            slot INTEGER NOT NULL,
            PRIMARY KEY (pull_request_id, reviewer_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for candidate pool and reviewer lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_team_active ON users(team_name, is_active);
        CREATE INDEX IF NOT EXISTS idx_users_active ON users(is_active);
        CREATE INDEX IF NOT EXISTS idx_pull_requests_status ON pull_requests(status);
        CREATE INDEX IF NOT EXISTS idx_reviewers_reviewer ON pull_request_reviewers(reviewer_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
