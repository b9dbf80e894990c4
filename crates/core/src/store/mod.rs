//! SQLite-backed storage shared by the worker and the page shell.
//!
//! This module provides a persistent store using SQLite with async access
//! via tokio-rusqlite. It holds:
//!
//! - Named response caches (static and dynamic generations)
//! - The durable reminder table driving daily notifications
//! - The settings document
//!
//! Schema changes go through numbered migrations; WAL mode allows the host
//! and background tasks to share one file.

pub mod caches;
pub mod connection;
pub mod digest;
pub mod migrations;
pub mod reminders;
pub mod settings;

pub use crate::Error;

pub use caches::{CacheInfo, CachedResponse};
pub use connection::Store;
pub use reminders::{Reminder, ReminderKind};
pub use settings::{Backup, Settings};
