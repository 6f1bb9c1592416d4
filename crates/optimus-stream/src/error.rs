//! Error types for the streaming engine.
//!
//! Only transport-level problems and rejected submissions surface as errors.
//! A malformed record inside an otherwise healthy stream is dropped by the
//! event parser and never becomes a `StreamError`.

use thiserror::Error;

/// A result type using `StreamError`.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Message used when a failed response carries no body text.
pub const FALLBACK_STREAM_ERROR: &str = "Failed to start agent stream";

/// Errors that end a stream session or reject a request.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The HTTP transfer failed (connection refused, reset, body unreadable).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    ///
    /// Displays as the response body so the operator sees the backend's own words.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text, or a fallback when the body was empty.
        message: String,
    },

    /// A successful response arrived without a body to stream.
    #[error("response has no body")]
    MissingBody,

    /// The submitted query was empty after trimming.
    #[error("query must not be empty")]
    EmptyQuery,

    /// A non-streaming response could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StreamError {
    /// Build a `Status` error from a status code and raw body text.
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            FALLBACK_STREAM_ERROR.to_string()
        } else {
            body.to_string()
        };
        Self::Status { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_displays_body_verbatim() {
        let err = StreamError::status(500, "internal error");
        assert_eq!(err.to_string(), "internal error");
        assert!(matches!(err, StreamError::Status { status: 500, .. }));
    }

    #[test]
    fn status_error_falls_back_on_empty_body() {
        let err = StreamError::status(502, "  ");
        assert_eq!(err.to_string(), FALLBACK_STREAM_ERROR);
    }
}
