//! Unified error types for noor.
//!
//! Every variant renders with a stable `CODE:` prefix so hosts can match on
//! the message without depending on the Rust type.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the noor worker and its storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network request could not be completed.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Static manifest could not be cached as a whole.
    #[error("PRECACHE_FAILED: {0}")]
    PrecacheFailed(String),

    /// Clock time is not `HH:MM`.
    #[error("INVALID_TIME: {0}")]
    InvalidTime(String),

    /// No reminder with the given tag.
    #[error("REMINDER_NOT_FOUND: {0}")]
    ReminderNotFound(String),

    /// Notification could not be displayed.
    #[error("NOTIFY_FAILED: {0}")]
    NotifyFailed(String),

    /// Backup document could not be imported.
    #[error("IMPORT_FAILED: {0}")]
    ImportFailed(String),

    /// Worker is in the wrong lifecycle state for the operation.
    #[error("WORKER_STATE: {0}")]
    WorkerState(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32004, msg.clone()),
            Error::PrecacheFailed(msg) => (-32006, msg.clone()),
            Error::InvalidTime(msg) => (-32602, msg.clone()),
            Error::ReminderNotFound(msg) => (-32007, msg.clone()),
            Error::NotifyFailed(msg) => (-32008, msg.clone()),
            Error::ImportFailed(msg) => (-32009, msg.clone()),
            Error::WorkerState(msg) => (-32010, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
