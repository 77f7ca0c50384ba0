/// Unified database error type for connection and bootstrap operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Transport-level failure talking to the database's HTTP API
    #[cfg(feature = "couchdb")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The server answered with a status the caller did not expect
    #[error("Unexpected response {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
