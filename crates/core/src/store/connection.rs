//! Opening the store: one SQLite file in WAL mode shared by the cache
//! manager, the reminder scheduler and the settings tools.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// Applied to every connection before migrations run. The busy timeout
/// covers dynamic cache writes that land while a tool call holds the file.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

/// Handle to the noor database.
///
/// Statements run on tokio-rusqlite's background thread, so every method is
/// async and the handle can be cloned into spawned tasks.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the database file and bring its schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening store");
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Fresh in-memory database with the full schema. Used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS))
            .await
            .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }

    /// Highest applied migration.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0)))
            .await
            .map_err(Error::Database)
    }
}
