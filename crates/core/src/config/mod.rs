//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NOOR_*)
//! 2. TOML config file (if NOOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NOOR_*)
/// 2. TOML config file (if NOOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding caches, reminders and settings.
    ///
    /// Set via NOOR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the shell is served from. Relative manifest entries resolve
    /// against it and only responses from it are cached dynamically.
    ///
    /// Set via NOOR_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via NOOR_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via NOOR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Largest response body accepted from the network, in bytes.
    ///
    /// Set via NOOR_MAX_BODY_BYTES environment variable.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Name of the install-time cache.
    #[serde(default = "default_static_cache")]
    pub static_cache: String,

    /// Name of the runtime cache.
    #[serde(default = "default_dynamic_cache")]
    pub dynamic_cache: String,

    /// URLs cached at install. Relative paths resolve against `origin`.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Document served for navigations while offline.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Suffix appended to every document title.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Endpoint refreshed by the `prayer-times-sync` background sync.
    #[serde(default = "default_sync_url")]
    pub sync_url: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./noor.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "noor/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_static_cache() -> String {
    "static-v1".into()
}

fn default_dynamic_cache() -> String {
    "dynamic-v1".into()
}

fn default_precache_urls() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/assets/css/main.css",
        "/assets/css/responsive.css",
        "/assets/css/animations.css",
        "/assets/js/app.js",
        "/assets/js/router.js",
        "/assets/js/components.js",
        "/assets/js/utils.js",
        "/manifest.json",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_offline_document() -> String {
    "/index.html".into()
}

fn default_app_title() -> String {
    "أذكار المسلم المحترف".into()
}

fn default_sync_url() -> String {
    "/api/prayer-times".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            static_cache: default_static_cache(),
            dynamic_cache: default_dynamic_cache(),
            precache_urls: default_precache_urls(),
            offline_document: default_offline_document(),
            app_title: default_app_title(),
            sync_url: default_sync_url(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NOOR_`
    /// 2. TOML file from `NOOR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NOOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("NOOR_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The configured origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }
}
