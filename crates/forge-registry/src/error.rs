use thiserror::Error;

/// Errors raised by the registry client.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The remote index could not be fetched and no cached or local fallback
    /// was available.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),
    /// A requested package id does not exist in the registry index.
    #[error("package not found: {0}")]
    PackageNotFound(String),
    /// An HTTP download returned a non-2xx status.
    #[error("download failed: {url} returned {status:?}")]
    DownloadFailed {
        /// The URL that was fetched.
        url: String,
        /// The HTTP status code, when one was received.
        status: Option<u16>,
    },
    /// Archive extraction failed.
    #[error("failed to extract {archive} as {kind}: {message}")]
    ExtractFailed {
        /// Path to the archive that failed to extract.
        archive: String,
        /// The archive type that was attempted.
        kind: String,
        /// Underlying error message.
        message: String,
    },
    /// A downloaded artifact's SHA-256 digest did not match the expected
    /// value.
    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Path to the file that was hashed.
        path: String,
        /// The expected hex digest.
        expected: String,
        /// The computed hex digest.
        actual: String,
    },
    /// Local filesystem I/O error.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the I/O operation was performed against.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse a JSON document (registry index or manifest).
    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        /// Path of the file that failed to parse.
        path: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Specialized result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
