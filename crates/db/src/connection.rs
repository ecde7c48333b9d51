use std::time::Duration;

use maitre_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

/// Opens a pool sized and timed per the application's database section.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| Box::pin(apply_session_pragmas(conn)))
        .connect(database_url)
        .await
}

// Restaurant lookups are read-heavy against externally managed tables, so the
// session setup stays minimal: referential integrity on, short write-lock wait.
async fn apply_session_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
    Ok(())
}
