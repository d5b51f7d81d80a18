//! Error types for the houseprice crate.
//!
//! Fetch and parse failures are kept apart so the retry layer can tell a
//! transient network problem from a response whose shape will never change.

use thiserror::Error;

/// The main error type for houseprice operations.
#[derive(Debug, Error)]
pub enum HousePriceError {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A network fetch failed.
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// A response could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HousePriceError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Error raised by a single network attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, DNS, TLS or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with an unexpected status code.
    #[error("HTTP {status} for {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The request could not be built (bad URL, bad header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Returns the HTTP status when the error carries one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Error raised while turning a response body into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The body is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A required JSON field is absent or has the wrong type.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A required HTML element is absent.
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// The API answered with its own non-zero status code.
    #[error("Application status {0}")]
    ApplicationStatus(i64),

    /// A configured extraction pattern is unusable.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl ParseError {
    /// Whether the failure should be treated like a transient fetch failure.
    ///
    /// Only an application-level status rejection qualifies; every other
    /// parse error describes a response whose shape a retry will not fix.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ApplicationStatus(_))
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HousePriceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 503,
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503 for https://example.com");
        assert_eq!(err.status(), Some(503));
        assert_eq!(FetchError::Transport("reset".to_string()).status(), None);
    }

    #[test]
    fn test_parse_error_retryable() {
        assert!(ParseError::ApplicationStatus(302).is_retryable());
        assert!(!ParseError::MissingField("result".to_string()).is_retryable());
        assert!(!ParseError::InvalidJson("eof".to_string()).is_retryable());
    }

    #[test]
    fn test_wrapping_into_main_error() {
        let err: HousePriceError = ParseError::MissingElement("span".to_string()).into();
        assert!(matches!(err, HousePriceError::Parse(_)));
        assert_eq!(err.to_string(), "Missing element: span");

        let err = HousePriceError::config("concurrency must be at least 1");
        assert_eq!(
            err.to_string(),
            "Configuration error: concurrency must be at least 1"
        );
    }
}
