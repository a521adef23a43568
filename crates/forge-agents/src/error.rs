use thiserror::Error;

/// Errors raised while reading or writing a third-party agent's config file.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The config file could not be read or written.
    #[error("io error at {path}: {source}")]
    Io {
        /// The file that failed.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exists but could not be parsed in its declared
    /// format.
    #[error("failed to parse {path} as {format}: {message}")]
    Parse {
        /// The file that failed to parse.
        path: std::path::PathBuf,
        /// `"json"` or `"toml"`.
        format: &'static str,
        /// Parser error message.
        message: String,
    },
    /// `$HOME` (or the platform equivalent) could not be resolved.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Specialized result type for forge-agents operations.
pub type AgentResult<T> = Result<T, AgentError>;
