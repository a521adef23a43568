use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Neither a YAML nor JSON parse of the document succeeded.
    #[error("failed to parse manifest at {path}: {message}")]
    ParseFailed {
        /// Path of the document that failed to parse.
        path: PathBuf,
        /// Combined parser error message.
        message: String,
    },
    /// The manifest parsed but failed schema validation.
    #[error("manifest at {source} is invalid: {errors:?}")]
    Invalid {
        /// Path (or inline origin) of the offending manifest.
        source: String,
        /// Human-readable list of validation failures.
        errors: Vec<String>,
    },
    /// The manifest's own `id` field uses an invalid package-id grammar.
    #[error(transparent)]
    InvalidId(#[from] forge_core::CoreError),
}

/// Specialized result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;
