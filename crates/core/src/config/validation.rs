//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `max_body_bytes` is zero
    /// - `origin` is not an http(s) URL
    /// - a cache name is empty, or both cache names are equal
    ///
    /// Returns `ConfigError::Missing` if `offline_document` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_body_bytes".into(), reason: "must be positive".into() });
        }

        let origin = self.origin_url()?;
        if origin.scheme() != "http" && origin.scheme() != "https" {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        if self.static_cache.is_empty() {
            return Err(ConfigError::Invalid { field: "static_cache".into(), reason: "must not be empty".into() });
        }
        if self.dynamic_cache.is_empty() {
            return Err(ConfigError::Invalid { field: "dynamic_cache".into(), reason: "must not be empty".into() });
        }
        if self.static_cache == self.dynamic_cache {
            return Err(ConfigError::Invalid {
                field: "dynamic_cache".into(),
                reason: "must differ from static_cache".into(),
            });
        }

        if self.offline_document.is_empty() {
            return Err(ConfigError::Missing {
                field: "offline_document".into(),
                hint: "Set NOOR_OFFLINE_DOCUMENT, e.g. /index.html".into(),
            });
        }

        if !self.precache_urls.iter().any(|u| u == &self.offline_document) {
            tracing::warn!(
                offline_document = %self.offline_document,
                "offline_document is not in precache_urls; navigations will have no offline fallback"
            );
        }

        Ok(())
    }
}
