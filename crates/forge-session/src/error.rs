use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the session database.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required core path could not be resolved.
    #[error(transparent)]
    Core(#[from] forge_core::CoreError),
    /// Local filesystem I/O error, e.g. creating the `db/` directory or
    /// reading a transcript file.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the I/O operation was performed against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The underlying SQL engine returned an error.
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    /// A migration could not be applied.
    #[error("migration from version {from} to {to} failed: {cause}")]
    MigrationFailed {
        /// The schema version migrated from.
        from: i64,
        /// The schema version the migration targets.
        to: i64,
        /// The underlying SQL error.
        cause: String,
    },
    /// The process-singleton connection's lock was poisoned by a panicking
    /// holder.
    #[error("session database lock poisoned")]
    LockPoisoned,
    /// A transcript file could not be parsed by its provider's format.
    #[error("failed to parse transcript {path} ({provider}): {message}")]
    TranscriptParse {
        /// The offending file.
        path: PathBuf,
        /// `"claude"`, `"codex"`, or `"gemini"`.
        provider: &'static str,
        /// Parser error message.
        message: String,
    },
}

/// Specialized result type for session-database operations.
pub type SessionResult<T> = Result<T, SessionError>;
