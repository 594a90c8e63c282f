//! Server error types.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or running.
///
/// Per-connection failures never surface here: they are logged and the
/// connection is dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configured address could not be parsed.
    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The address as configured.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Failed to bind a listener.
    #[error("Bind error: {0}")]
    BindError(String),

    /// I/O error during server operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create an invalid address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}
