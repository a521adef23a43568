use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the installer.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// Underlying resolver failure (invalid id, unsatisfied dependency).
    #[error(transparent)]
    Resolver(#[from] forge_resolver::ResolverError),
    /// Underlying registry failure (fetch, download, extract, hash).
    #[error(transparent)]
    Registry(#[from] forge_registry::RegistryError),
    /// Underlying manifest failure (parse, validate).
    #[error(transparent)]
    Manifest(#[from] forge_manifest::ManifestError),
    /// A required core path could not be resolved.
    #[error(transparent)]
    Core(#[from] forge_core::CoreError),
    /// A subprocess-backed install step (`npm`, `pip`) failed.
    #[error("command '{program}' failed with {status:?}: {stderr}")]
    CommandFailed {
        /// The program that was invoked.
        program: String,
        /// Its exit status, when one was observed.
        status: Option<i32>,
        /// Captured stderr.
        stderr: String,
    },
    /// Local filesystem I/O error.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the I/O operation was performed against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Failed to serialize or parse a lockfile, manifest, or cache document.
    #[error("serialization error at {path}: {message}")]
    Serde {
        /// Path of the offending document.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// The install source path does not exist (`installFromLocal`).
    #[error("local source path does not exist: {0}")]
    LocalSourceMissing(PathBuf),
}

/// Specialized result type for installer operations.
pub type InstallerResult<T> = Result<T, InstallerError>;
