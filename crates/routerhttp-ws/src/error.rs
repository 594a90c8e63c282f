//! Error types for WebSocket operations.
//!
//! This module defines the errors that can occur during the opening
//! handshake, while exchanging frames, and while managing the connection
//! registry.

use thiserror::Error;

/// Result type for WebSocket operations.
pub type WsResult<T> = Result<T, WsError>;

/// Errors that can occur during WebSocket operations.
#[derive(Debug, Error)]
pub enum WsError {
    /// The opening handshake failed.
    #[error("WebSocket handshake failed: {0}")]
    HandshakeFailed(String),

    /// The handshake did not complete in time.
    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    /// Operation attempted on a connection that is already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Admission control rejected the connection.
    #[error("too many connections (limit {limit})")]
    TooManyConnections {
        /// The configured ceiling.
        limit: isize,
    },

    /// Failed to send a frame.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// A frame payload could not be decoded as text.
    #[error("failed to decode message: {0}")]
    DecodeFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tungstenite::Error),
}

impl WsError {
    /// Create a new handshake failed error.
    pub fn handshake_failed(reason: impl Into<String>) -> Self {
        Self::HandshakeFailed(reason.into())
    }

    /// Create a new send failed error.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed(reason.into())
    }

    /// Create a new admission control error.
    pub fn too_many_connections(limit: isize) -> Self {
        Self::TooManyConnections { limit }
    }

    /// Check if this error means the connection is gone.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DecodeFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_failed() {
        let err = WsError::handshake_failed("missing Sec-WebSocket-Key");
        assert!(matches!(err, WsError::HandshakeFailed(_)));
        assert!(err.to_string().contains("Sec-WebSocket-Key"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_too_many_connections() {
        let err = WsError::too_many_connections(2);
        assert_eq!(err.to_string(), "too many connections (limit 2)");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_decode_failed_not_fatal() {
        let err = WsError::DecodeFailed("invalid utf-8".into());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_closed_is_fatal() {
        assert!(WsError::ConnectionClosed.is_fatal());
        assert!(WsError::send_failed("broken pipe").is_fatal());
    }
}
