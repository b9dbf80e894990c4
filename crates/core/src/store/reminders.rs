//! Durable reminder table.
//!
//! Each row is a daily reminder keyed by tag. `next_fire_at` is always the
//! next instant the reminder should fire; the scheduler advances it after
//! every fire, so a restart picks the chain up from the table.

use super::connection::Store;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// What a reminder is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Prayer,
    Azkar,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::Prayer => "prayer",
            ReminderKind::Azkar => "azkar",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "prayer" => Some(ReminderKind::Prayer),
            "azkar" => Some(ReminderKind::Azkar),
            _ => None,
        }
    }
}

/// A daily reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub tag: String,
    pub kind: ReminderKind,
    /// Local clock time, `HH:MM`.
    pub clock_time: String,
    pub title: String,
    pub body: String,
    pub next_fire_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn read_reminder(row: &rusqlite::Row<'_>) -> Result<Reminder, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let next_fire_at: String = row.get(5)?;
    let last_fired_at: Option<String> = row.get(6)?;
    Ok(Reminder {
        tag: row.get(0)?,
        kind: ReminderKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown reminder kind: {kind}").into(),
            )
        })?,
        clock_time: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        next_fire_at: parse_ts(5, &next_fire_at)?,
        last_fired_at: last_fired_at.as_deref().map(|raw| parse_ts(6, raw)).transpose()?,
    })
}

const SELECT_REMINDER: &str =
    "SELECT tag, kind, clock_time, title, body, next_fire_at, last_fired_at FROM reminders";

impl Store {
    /// Insert or replace a reminder by tag.
    ///
    /// Re-scheduling an existing tag moves its next fire time; it never
    /// creates a second chain.
    pub async fn upsert_reminder(&self, reminder: &Reminder) -> Result<(), Error> {
        let reminder = reminder.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO reminders (
                        tag, kind, clock_time, title, body, next_fire_at, last_fired_at, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(tag) DO UPDATE SET
                        kind = excluded.kind,
                        clock_time = excluded.clock_time,
                        title = excluded.title,
                        body = excluded.body,
                        next_fire_at = excluded.next_fire_at",
                    params![
                        &reminder.tag,
                        reminder.kind.as_str(),
                        &reminder.clock_time,
                        &reminder.title,
                        &reminder.body,
                        ts(&reminder.next_fire_at),
                        reminder.last_fired_at.as_ref().map(ts),
                        ts(&Utc::now()),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a reminder by tag.
    pub async fn get_reminder(&self, tag: &str) -> Result<Option<Reminder>, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Reminder>, Error> {
                let result = conn.query_row(&format!("{SELECT_REMINDER} WHERE tag = ?1"), params![tag], read_reminder);
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// All reminders, soonest first.
    pub async fn list_reminders(&self) -> Result<Vec<Reminder>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<Reminder>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_REMINDER} ORDER BY next_fire_at ASC, tag ASC"))?;
                let reminders = stmt
                    .query_map([], read_reminder)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(reminders)
            })
            .await
            .map_err(Error::from)
    }

    /// The reminder that fires next, if any.
    pub async fn next_reminder(&self) -> Result<Option<Reminder>, Error> {
        self.conn
            .call(|conn| -> Result<Option<Reminder>, Error> {
                let result = conn.query_row(
                    &format!("{SELECT_REMINDER} ORDER BY next_fire_at ASC, tag ASC LIMIT 1"),
                    [],
                    read_reminder,
                );
                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Reminders whose fire time is at or before `now`.
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, Error> {
        let now = ts(&now);
        self.conn
            .call(move |conn| -> Result<Vec<Reminder>, Error> {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_REMINDER} WHERE next_fire_at <= ?1 ORDER BY next_fire_at ASC"))?;
                let reminders = stmt
                    .query_map(params![now], read_reminder)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(reminders)
            })
            .await
            .map_err(Error::from)
    }

    /// Move a reminder to its next fire time.
    ///
    /// `fired_at` is recorded when the reminder actually fired; a roll-forward
    /// of a missed reminder passes `None` and keeps the previous value.
    pub async fn advance_reminder(
        &self, tag: &str, next_fire_at: DateTime<Utc>, fired_at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        let tag = tag.to_string();
        let next = ts(&next_fire_at);
        let fired = fired_at.as_ref().map(ts);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let updated = conn.execute(
                    "UPDATE reminders
                     SET next_fire_at = ?2, last_fired_at = COALESCE(?3, last_fired_at)
                     WHERE tag = ?1",
                    params![tag, next, fired],
                )?;
                if updated == 0 {
                    return Err(Error::ReminderNotFound(tag));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a reminder. Returns false if the tag was unknown.
    pub async fn delete_reminder(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM reminders WHERE tag = ?1", params![tag])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reminder(tag: &str, at: DateTime<Utc>) -> Reminder {
        Reminder {
            tag: tag.to_string(),
            kind: ReminderKind::Prayer,
            clock_time: "05:30".to_string(),
            title: "Fajr".to_string(),
            body: "It is time for prayer".to_string(),
            next_fire_at: at,
            last_fired_at: None,
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Store::open_in_memory().await.unwrap();
        db.upsert_reminder(&reminder("prayer-fajr", at(5, 30))).await.unwrap();

        let got = db.get_reminder("prayer-fajr").await.unwrap().unwrap();
        assert_eq!(got.kind, ReminderKind::Prayer);
        assert_eq!(got.next_fire_at, at(5, 30));
        assert!(got.last_fired_at.is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_tag() {
        let db = Store::open_in_memory().await.unwrap();
        db.upsert_reminder(&reminder("azkar-morning", at(6, 0))).await.unwrap();
        db.upsert_reminder(&reminder("azkar-morning", at(7, 0))).await.unwrap();

        let all = db.list_reminders().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].next_fire_at, at(7, 0));
    }

    #[tokio::test]
    async fn test_next_and_due() {
        let db = Store::open_in_memory().await.unwrap();
        db.upsert_reminder(&reminder("prayer-isha", at(19, 45))).await.unwrap();
        db.upsert_reminder(&reminder("prayer-fajr", at(5, 30))).await.unwrap();

        assert_eq!(db.next_reminder().await.unwrap().unwrap().tag, "prayer-fajr");

        let due = db.due_reminders(at(12, 0)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].tag, "prayer-fajr");
    }

    #[tokio::test]
    async fn test_advance_records_fire() {
        let db = Store::open_in_memory().await.unwrap();
        db.upsert_reminder(&reminder("prayer-fajr", at(5, 30))).await.unwrap();

        let next = at(5, 30) + Duration::days(1);
        db.advance_reminder("prayer-fajr", next, Some(at(5, 30))).await.unwrap();

        let got = db.get_reminder("prayer-fajr").await.unwrap().unwrap();
        assert_eq!(got.next_fire_at, next);
        assert_eq!(got.last_fired_at, Some(at(5, 30)));

        db.advance_reminder("prayer-fajr", next + Duration::days(1), None).await.unwrap();
        let got = db.get_reminder("prayer-fajr").await.unwrap().unwrap();
        assert_eq!(got.last_fired_at, Some(at(5, 30)));
    }

    #[tokio::test]
    async fn test_advance_unknown_tag() {
        let db = Store::open_in_memory().await.unwrap();
        let result = db.advance_reminder("missing", at(1, 0), None).await;
        assert!(matches!(result, Err(Error::ReminderNotFound(tag)) if tag == "missing"));
    }

    #[tokio::test]
    async fn test_delete_reminder() {
        let db = Store::open_in_memory().await.unwrap();
        db.upsert_reminder(&reminder("prayer-fajr", at(5, 30))).await.unwrap();
        assert!(db.delete_reminder("prayer-fajr").await.unwrap());
        assert!(!db.delete_reminder("prayer-fajr").await.unwrap());
        assert!(db.next_reminder().await.unwrap().is_none());
    }
}
