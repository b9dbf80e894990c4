//! Named response caches.
//!
//! Mirrors the browser Cache Storage model: any number of named caches, each
//! mapping a request URL to one stored response. Lookups across caches walk
//! them in creation order, so the install-time cache answers before the
//! runtime one when both hold the same URL.

use super::connection::Store;
use super::digest::body_digest;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub cached_at: String,
    /// `basic`, `cors` or `default`, as the fetch layer classified it.
    #[serde(default = "default_response_type")]
    pub response_type: String,
}

fn default_response_type() -> String {
    "basic".into()
}

impl CachedResponse {
    /// Build an entry stamped with the current time.
    pub fn new(url: impl Into<String>, status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type,
            headers: Vec::new(),
            body,
            cached_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            response_type: default_response_type(),
        }
    }
}

/// Summary of one named cache.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheInfo {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

fn ensure_cache(conn: &rusqlite::Connection, name: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at, seq)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM caches))",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn insert_entry(conn: &rusqlite::Connection, cache: &str, entry: &CachedResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)
        .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
    conn.execute(
        "INSERT INTO cache_entries (
            cache_name, url, status, content_type, headers_json, body, body_sha256, cached_at, response_type
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(cache_name, url) DO UPDATE SET
            status = excluded.status,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            body_sha256 = excluded.body_sha256,
            cached_at = excluded.cached_at,
            response_type = excluded.response_type",
        params![
            cache,
            &entry.url,
            entry.status as i64,
            &entry.content_type,
            headers_json,
            &entry.body,
            body_digest(&entry.body),
            &entry.cached_at,
            &entry.response_type,
        ],
    )?;
    Ok(())
}

struct StoredRow {
    cache_name: String,
    response: CachedResponse,
    digest: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> Result<StoredRow, rusqlite::Error> {
    let headers_json: Option<String> = row.get(4)?;
    Ok(StoredRow {
        cache_name: row.get(0)?,
        response: CachedResponse {
            url: row.get(1)?,
            status: row.get::<_, i64>(2)? as u16,
            content_type: row.get(3)?,
            headers: headers_json
                .and_then(|j| serde_json::from_str(&j).ok())
                .unwrap_or_default(),
            body: row.get(5)?,
            cached_at: row.get(7)?,
            response_type: row.get(8)?,
        },
        digest: row.get(6)?,
    })
}

const SELECT_ENTRY: &str = "SELECT e.cache_name, e.url, e.status, e.content_type, e.headers_json,
        e.body, e.body_sha256, e.cached_at, e.response_type
    FROM cache_entries e JOIN caches c ON c.name = e.cache_name";

impl Store {
    /// Create the named cache if it does not exist yet.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a cache with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Cache names in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every cache with its entry count, in creation order.
    pub async fn list_caches(&self) -> Result<Vec<CacheInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, COUNT(e.url), c.created_at
                     FROM caches c LEFT JOIN cache_entries e ON e.cache_name = c.name
                     GROUP BY c.name ORDER BY c.seq ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(CacheInfo { name: row.get(0)?, entries: row.get::<_, i64>(1)? as u64, created_at: row.get(2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and all of its entries.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every cache. Returns the number of caches removed.
    pub async fn delete_all_caches(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM caches", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Store one response, creating the cache on first use.
    pub async fn put_response(&self, cache: &str, entry: &CachedResponse) -> Result<(), Error> {
        let cache = cache.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &cache)?;
                insert_entry(conn, &cache, &entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses atomically: either every entry is written
    /// or none is.
    pub async fn put_all_responses(&self, cache: &str, entries: Vec<CachedResponse>) -> Result<(), Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &cache)?;
                for entry in &entries {
                    insert_entry(&tx, &cache, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a URL in one cache.
    pub async fn match_in(&self, cache: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let cache = cache.to_string();
        let url = url.to_string();
        let sql = format!("{SELECT_ENTRY} WHERE e.cache_name = ?1 AND e.url = ?2");
        let found = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let result = conn.query_row(&sql, params![cache, url], read_row);
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        match found {
            Some(row) => self.verified(row).await.map(|r| r.map(|(_, resp)| resp)),
            None => Ok(None),
        }
    }

    /// Look up a URL across all caches, oldest cache first.
    ///
    /// Returns the name of the cache that answered along with the response.
    pub async fn match_any(&self, url: &str) -> Result<Option<(String, CachedResponse)>, Error> {
        let url = url.to_string();
        let sql = format!("{SELECT_ENTRY} WHERE e.url = ?1 ORDER BY c.seq ASC");
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<StoredRow>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![url], read_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        for row in rows {
            if let Some(hit) = self.verified(row).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// URLs stored in a cache, sorted.
    pub async fn cache_keys(&self, cache: &str) -> Result<Vec<String>, Error> {
        let cache = cache.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE cache_name = ?1 ORDER BY url")?;
                let keys = stmt
                    .query_map(params![cache], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry. Returns false if it was not present.
    pub async fn delete_response(&self, cache: &str, url: &str) -> Result<bool, Error> {
        let cache = cache.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM cache_entries WHERE cache_name = ?1 AND url = ?2", params![cache, url])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop rows whose body no longer matches the stored digest.
    async fn verified(&self, row: StoredRow) -> Result<Option<(String, CachedResponse)>, Error> {
        if body_digest(&row.response.body) == row.digest {
            return Ok(Some((row.cache_name, row.response)));
        }

        tracing::warn!(cache = %row.cache_name, url = %row.response.url, "evicting corrupt cache entry");
        self.delete_response(&row.cache_name, &row.response.url).await?;
        Ok(None)
    }
}
