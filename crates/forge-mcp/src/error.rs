use thiserror::Error;

/// Errors raised while spawning or talking to a stack's MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// The stack's launch binary does not exist.
    #[error("launch binary not found: {0}")]
    BinaryNotFound(String),
    /// One or more required secrets are not configured.
    #[error("missing required secrets: {0:?}")]
    MissingSecrets(Vec<String>),
    /// The subprocess could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to spawn.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A request did not receive a response before the timeout elapsed.
    #[error("timeout after {0}ms")]
    Timeout(u64),
    /// The subprocess closed its stdout before responding.
    #[error("server closed stdout")]
    ServerClosed,
    /// A response could not be parsed as JSON-RPC.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The server returned a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    ServerError {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// Local filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Specialized result type for forge-mcp operations.
pub type McpResult<T> = Result<T, McpError>;
