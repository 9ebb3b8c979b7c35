//! Common error types used throughout mediarch.
//!
//! This module provides a unified error type that covers common failure cases
//! across the enrichment pipeline: not found, database errors, I/O failures,
//! and the provider-facing taxonomy (rate limiting, circuit breaking,
//! retryable transport failures).

use std::time::Duration;

/// Common error type for mediarch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// The provider returned HTTP 429; retry after the given duration if known.
    #[error("rate limited{}", .retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// The provider's circuit breaker is open; calls fail fast until reset.
    #[error("circuit open for provider {provider}")]
    CircuitOpen { provider: String },

    /// A transport-level failure (timeout, reset, DNS, 5xx) that is safe to retry.
    #[error("provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Authentication failed against a provider (401/403); not retryable.
    #[error("provider {provider} auth failed: {message}")]
    ProviderAuth { provider: String, message: String },

    /// A job handler observed cancellation at a suspension point.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Alias for invalid_input (for consistency).
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether a job handler or adapter should retry after this error, per
    /// the provider-facing error taxonomy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ProviderUnavailable { .. } | Self::Database(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("test item");
        assert_eq!(err.to_string(), "not found: test item");

        let err = Error::database("connection failed");
        assert_eq!(err.to_string(), "database error: connection failed");

        let err = Error::invalid_input("bad format");
        assert_eq!(err.to_string(), "invalid input: bad format");

        let err = Error::internal("unexpected state");
        assert_eq!(err.to_string(), "internal error: unexpected state");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(Error::ProviderUnavailable {
            provider: "tmdb".into(),
            message: "timeout".into()
        }
        .is_retryable());
        assert!(!Error::ProviderAuth {
            provider: "tmdb".into(),
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!Error::CircuitOpen {
            provider: "tmdb".into()
        }
        .is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_result_type() {
        fn test_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(test_fn().unwrap(), 42);

        fn error_fn() -> Result<i32> {
            Err(Error::Cancelled)
        }
        assert!(error_fn().is_err());
    }

    #[test]
    fn test_circuit_open_message_names_provider() {
        let err = Error::CircuitOpen {
            provider: "tmdb".into(),
        };
        assert_eq!(err.to_string(), "circuit open for provider tmdb");
    }
}
