//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A table or column name that is not a plain identifier.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Stored JSON could not be read back.
    #[error("Malformed stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking task running the query panicked or was cancelled.
    #[error("Database task failed: {0}")]
    Task(String),
}
