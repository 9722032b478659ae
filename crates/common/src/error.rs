//! Common error types for Sitewatch components.

use std::fmt;

/// A specialized Result type for Sitewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Sitewatch operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Target source error: {0}")]
    Source(String),

    #[error("Outcome sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new database error.
    pub fn database(msg: impl fmt::Display) -> Self {
        Error::Database(msg.to_string())
    }

    /// Create a new target source error.
    pub fn source(msg: impl fmt::Display) -> Self {
        Error::Source(msg.to_string())
    }

    /// Create a new outcome sink error.
    pub fn sink(msg: impl fmt::Display) -> Self {
        Error::Sink(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::source("connection refused").to_string(),
            "Target source error: connection refused"
        );
        assert_eq!(Error::sink("disk full").to_string(), "Outcome sink error: disk full");
        assert_eq!(Error::database("timeout").to_string(), "Database error: timeout");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
