//! Numbered schema migrations.
//!
//! `_migrations` records every applied version. Each pending migration runs
//! in its own transaction together with its version row, so a failed batch
//! leaves the schema at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, params};

const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_caches.sql")),
    (2, include_str!("../../migrations/002_reminders.sql")),
    (3, include_str!("../../migrations/003_settings.sql")),
    (4, include_str!("../../migrations/004_response_type.sql")),
];

/// Version the schema is at once every migration has run.
pub const LATEST: i64 = MIGRATIONS[MIGRATIONS.len() - 1].0;

/// Apply every migration newer than the recorded version.
///
/// # Errors
///
/// `Error::MigrationFailed` naming the version whose SQL was rejected.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
            row.get(0)
        })?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            tracing::debug!(version, "applying migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("migration {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tables(conn: &Connection) -> Vec<String> {
        conn.call(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
            let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
            Ok::<_, tokio_rusqlite::rusqlite::Error>(names)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let names = tables(&conn).await;
        for table in ["_migrations", "cache_entries", "caches", "reminders", "settings"] {
            assert!(names.iter().any(|n| n == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_one_row_per_version() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let versions: Vec<i64> = conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT version FROM _migrations ORDER BY version")?;
                let rows = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<i64>, _>>()?;
                Ok::<_, tokio_rusqlite::rusqlite::Error>(rows)
            })
            .await
            .unwrap();

        assert_eq!(versions, (1..=LATEST).collect::<Vec<_>>());
    }
}
