//! Error types for ipwho-core
//!
//! Invocation-level errors only. Failures of individual sources are not
//! errors at this level; they are reported as
//! [`SourceOutcome::Failure`](crate::types::SourceOutcome) entries.

/// Result type alias for ipwho operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ipwho operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Target is not an IP address literal
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    /// Invalid command-line input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("Unknown argument: x".to_string());
        assert_eq!(err.to_string(), "Invalid input: Unknown argument: x");
    }

    #[test]
    fn test_invalid_ip_display() {
        let err = Error::InvalidIp("example.com".to_string());
        assert_eq!(err.to_string(), "Invalid IP address: example.com");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err = Error::from(io_err);
        assert!(err.to_string().contains("stdout closed"));
    }
}
