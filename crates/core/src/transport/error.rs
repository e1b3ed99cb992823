//! Error types for the transport module.

use std::time::Duration;
use thiserror::Error;

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Request did not complete in time.
    Timeout,
    /// Could not reach the platform.
    Connection,
    /// Platform asked us to slow down.
    RateLimited,
    /// Platform-side failure (5xx).
    Server,
    /// Request rejected as malformed.
    BadRequest,
    /// Credentials rejected.
    Unauthorized,
    /// Not allowed to access the chat or object.
    Forbidden,
    /// Object or chat does not exist.
    NotFound,
    /// Object exceeds the platform's size limit.
    TooLarge,
    /// Response did not match the expected shape.
    Protocol,
    /// Local file error.
    Io,
    /// Aborted through the cancellation token.
    Cancelled,
}

/// Error returned by a transport operation.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// Whether repeating the operation may succeed.
    pub transient: bool,
    /// Delay requested by the platform before the next attempt.
    pub retry_after: Option<Duration>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        let transient = matches!(
            kind,
            TransportErrorKind::Timeout
                | TransportErrorKind::Connection
                | TransportErrorKind::RateLimited
                | TransportErrorKind::Server
        );
        Self {
            kind,
            message: message.into(),
            transient,
            retry_after: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(TransportErrorKind::RateLimited, "too many requests")
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "operation cancelled")
    }

    /// Classifies an HTTP status returned by the platform.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            400 => TransportErrorKind::BadRequest,
            401 => TransportErrorKind::Unauthorized,
            403 => TransportErrorKind::Forbidden,
            404 => TransportErrorKind::NotFound,
            408 => TransportErrorKind::Timeout,
            413 => TransportErrorKind::TooLarge,
            429 => TransportErrorKind::RateLimited,
            500..=599 => TransportErrorKind::Server,
            _ => TransportErrorKind::Protocol,
        };
        Self::new(kind, message)
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.transient
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == TransportErrorKind::Cancelled
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::new(TransportErrorKind::Io, e.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let timeout = e.is_timeout();
        let connection = e.is_connect() || e.is_request() || e.is_body();
        let decode = e.is_decode();
        // Request URLs carry the bot token.
        let message = e.without_url().to_string();

        if timeout {
            Self::timeout(message)
        } else if connection {
            Self::connection(message)
        } else if let Some(status) = status {
            Self::from_status(status, message)
        } else if decode {
            Self::protocol(message)
        } else {
            Self::connection(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(TransportError::from_status(500, "boom").transient);
        assert!(TransportError::from_status(503, "busy").transient);
        assert!(TransportError::from_status(429, "slow down").transient);
        assert!(!TransportError::from_status(400, "bad").transient);
        assert!(!TransportError::from_status(401, "who").transient);
        assert!(!TransportError::from_status(403, "no").transient);
        assert!(!TransportError::from_status(404, "gone").transient);
        assert_eq!(
            TransportError::from_status(413, "big").kind,
            TransportErrorKind::TooLarge
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = TransportError::rate_limited(Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_io_and_cancel_are_terminal() {
        let err: TransportError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind, TransportErrorKind::Io);
        assert!(!err.is_retryable());
        assert!(TransportError::cancelled().is_cancelled());
        assert!(!TransportError::cancelled().is_retryable());
    }
}
