//! Settings document and backup import/export.

use super::connection::Store;
use crate::Error;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const SETTINGS_KEY: &str = "muslim-app-settings";

/// User settings.
///
/// Missing fields in stored or imported JSON fall back to their defaults,
/// so older documents keep loading as fields are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub language: String,
    pub notifications: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub font_size: u32,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "ar".into(),
            notifications: true,
            sound_enabled: true,
            vibration_enabled: true,
            font_size: 16,
            theme: "light".into(),
        }
    }
}

/// Exported backup document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub user_data: serde_json::Value,
    #[serde(default)]
    pub export_date: Option<String>,
}

impl Store {
    /// Load settings, falling back to defaults when nothing is stored.
    ///
    /// A stored document that no longer parses is logged and replaced by the
    /// defaults rather than failing the caller.
    pub async fn load_settings(&self) -> Result<Settings, Error> {
        let raw = self
            .conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value_json FROM settings WHERE key = ?1",
                    params![SETTINGS_KEY],
                    |row| row.get(0),
                );
                match result {
                    Ok(json) => Ok(Some(json)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored settings are unreadable; using defaults");
                Settings::default()
            })),
            None => Ok(Settings::default()),
        }
    }

    /// Persist settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<(), Error> {
        let json = serde_json::to_string(settings)
            .map_err(|e| Error::InvalidInput(format!("failed to encode settings: {e}")))?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![SETTINGS_KEY, json, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Drop stored settings and return the defaults.
    pub async fn reset_settings(&self) -> Result<Settings, Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM settings WHERE key = ?1", params![SETTINGS_KEY])?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(Settings::default())
    }

    /// Export the current settings as a pretty-printed backup document.
    pub async fn export_backup(&self) -> Result<String, Error> {
        let backup = Backup {
            settings: Some(self.load_settings().await?),
            user_data: serde_json::Value::Object(serde_json::Map::new()),
            export_date: Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        };
        serde_json::to_string_pretty(&backup).map_err(|e| Error::InvalidInput(format!("failed to encode backup: {e}")))
    }

    /// Import a backup document.
    ///
    /// Returns the imported settings, or `None` when the backup carries no
    /// settings section (stored settings are left untouched).
    ///
    /// # Errors
    ///
    /// Returns `Error::ImportFailed` if the document is not a valid backup.
    pub async fn import_backup(&self, json: &str) -> Result<Option<Settings>, Error> {
        let backup: Backup = serde_json::from_str(json).map_err(|e| Error::ImportFailed(e.to_string()))?;

        match backup.settings {
            Some(settings) => {
                self.save_settings(&settings).await?;
                tracing::info!(export_date = ?backup.export_date, "imported settings backup");
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_defaults() {
        let db = Store::open_in_memory().await.unwrap();
        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.font_size, 16);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let db = Store::open_in_memory().await.unwrap();
        let settings = Settings { theme: "dark".into(), font_size: 20, ..Default::default() };
        db.save_settings(&settings).await.unwrap();
        assert_eq!(db.load_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_reset() {
        let db = Store::open_in_memory().await.unwrap();
        db.save_settings(&Settings { theme: "dark".into(), ..Default::default() })
            .await
            .unwrap();
        db.reset_settings().await.unwrap();
        assert_eq!(db.load_settings().await.unwrap().theme, "light");
    }

    #[test]
    fn test_partial_document_merges_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"theme":"dark","soundEnabled":false}"#).unwrap();
        assert_eq!(settings.theme, "dark");
        assert!(!settings.sound_enabled);
        assert_eq!(settings.language, "ar");
        assert!(settings.notifications);
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let db = Store::open_in_memory().await.unwrap();
        db.save_settings(&Settings { language: "en".into(), ..Default::default() })
            .await
            .unwrap();
        let exported = db.export_backup().await.unwrap();
        assert!(exported.contains("\"exportDate\""));

        let other = Store::open_in_memory().await.unwrap();
        let imported = other.import_backup(&exported).await.unwrap().unwrap();
        assert_eq!(imported.language, "en");
        assert_eq!(other.load_settings().await.unwrap().language, "en");
    }

    #[tokio::test]
    async fn test_import_malformed() {
        let db = Store::open_in_memory().await.unwrap();
        let result = db.import_backup("{not json").await;
        assert!(matches!(result, Err(Error::ImportFailed(_))));
        assert_eq!(db.load_settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_import_without_settings() {
        let db = Store::open_in_memory().await.unwrap();
        let result = db.import_backup(r#"{"userData":{}}"#).await.unwrap();
        assert!(result.is_none());
    }
}
