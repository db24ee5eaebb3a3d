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

    /// A JSON column could not be encoded or decoded.
    #[error("Invalid JSON in column '{column}': {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A column held a value outside its domain.
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue { column: &'static str, value: String },

    /// A status write that is not an edge of the pipeline state machine.
    #[error("Invalid pipeline transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// The record was not in the expected status when the write happened.
    #[error("Pipeline record '{id}' is no longer in status '{expected}'")]
    StatusConflict { id: String, expected: String },

    /// A different AI session is still stored.
    #[error("unfinished request exists (record '{record_id}', question '{question_id}')")]
    UnfinishedRequest {
        record_id: String,
        question_id: String,
    },
}
