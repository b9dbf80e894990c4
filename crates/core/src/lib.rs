//! Core types and shared functionality for noor.
//!
//! This crate provides:
//! - The hash/History router driving the app shell
//! - SQLite storage for response caches, reminders and settings
//! - Unified error types
//! - Configuration structures
//! - Qibla bearing and distance helpers

pub mod config;
pub mod error;
pub mod qibla;
pub mod router;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use router::{Navigation, RouteChange, RouteOptions, Router};
pub use store::{CachedResponse, Reminder, ReminderKind, Settings, Store};
