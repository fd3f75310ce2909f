//! Schema steps for the gateway database, tracked in `_migrations`.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Ordered schema steps. A step's version is its position plus one.
const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/001_cache_stores.sql"),
    include_str!("../../migrations/002_submissions.sql"),
    include_str!("../../migrations/003_metadata_preferences.sql"),
];

fn applied_version(conn: &rusqlite::Connection) -> Result<usize, Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;
    let version: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    Ok(usize::try_from(version).unwrap_or(0))
}

/// Bring the schema up to date, one transaction per step.
///
/// # Errors
///
/// Returns [`Error::MigrationFailed`] naming the step whose SQL was rejected.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let applied = applied_version(conn)?;
        for (index, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
            let version = index + 1;
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version as i64, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "schema step applied");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Number of schema steps recorded as applied.
pub async fn schema_version(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| applied_version(conn)).await.map_err(Error::from)
}
