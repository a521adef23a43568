use thiserror::Error;

/// Errors raised while resolving paths or parsing package identifiers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested package id does not match `<kind>:<name>` or a bare name.
    #[error("invalid package id {0:?}: expected `<kind>:<name>` or a bare name")]
    InvalidPackageId(String),
    /// Neither `FORGE_HOME` nor `HOME` is set.
    #[error("cannot resolve home directory: neither FORGE_HOME nor HOME is set")]
    NoHomeDirectory,
    /// A directory under the Forge home could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// The directory that could not be created.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Specialized result type for `forge-core` operations.
pub type CoreResult<T> = Result<T, CoreError>;
