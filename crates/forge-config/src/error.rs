use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the config store.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required core path could not be resolved.
    #[error(transparent)]
    Core(#[from] forge_core::CoreError),
    /// Local filesystem I/O error.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the I/O operation was performed against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to serialize or parse the config document.
    #[error("serialization error at {path}: {message}")]
    Serde {
        /// Path of the offending document.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// The advisory lock could not be acquired within the retry window.
    #[error("timed out waiting for lock at {0}")]
    LockTimeout(PathBuf),
    /// A referenced stack id is not present in the config.
    #[error("unknown stack: {0}")]
    UnknownStack(String),
}

/// Specialized result type for config-store operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
