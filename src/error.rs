//! Error types for the job card renderer

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while merging or rendering a job card
#[derive(Error, Debug)]
pub enum Error {
    /// A job record or creative config is missing a required field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A template or config file could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The rasterization backend failed for a specific render
    #[error("Rasterization failed: {0}")]
    Backend(String),

    /// Failed to start the rasterization backend
    #[error("Backend initialization failed: {0}")]
    InitializationError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure was caused by the caller's input rather than the
    /// renderer itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_) | Error::Json(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_flagged() {
        assert!(Error::Validation("title".into()).is_client_error());
        assert!(Error::NotFound("x.html".into()).is_client_error());
        assert!(!Error::Backend("crash".into()).is_client_error());
        assert!(!Error::Timeout(10).is_client_error());
    }

    #[test]
    fn timeout_message_includes_duration() {
        assert_eq!(Error::Timeout(1500).to_string(), "Operation timed out after 1500ms");
    }
}
