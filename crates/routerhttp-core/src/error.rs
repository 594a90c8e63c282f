//! Error types for routerhttp.
//!
//! [`RouterError`] is the error taxonomy of the HTTP side of the server:
//! everything that can go wrong between accepting a connection and writing
//! the response. Errors are resolved per connection; none of them ever
//! escapes the task serving that connection.
//!
//! | Variant | HTTP status | Connection outcome |
//! |---|---|---|
//! | `MalformedRequest` | none | dropped without a response |
//! | `LengthRequired` | 411 | error response, then closed |
//! | `UnsupportedMediaType` | 415 | error response, then closed |
//! | `NotFound` | 404 | status handler may render a page |
//! | `Handler` | 500 | status handler may render a page |
//! | `Io` | none | closed |

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Result type alias using [`RouterError`].
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while parsing, routing or answering an HTTP request.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The request line could not be parsed, or an escape sequence was invalid.
    #[error("malformed request: {reason}")]
    MalformedRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// A POST request without a usable `Content-Length`.
    #[error("length required: {reason}")]
    LengthRequired {
        /// Why the body length was rejected.
        reason: String,
    },

    /// A POST body whose content type is not understood.
    #[error("unsupported media type: {content_type}")]
    UnsupportedMediaType {
        /// The offending content type (empty if the header was missing).
        content_type: String,
    },

    /// No static file and no route matched.
    #[error("not found: {path}")]
    NotFound {
        /// The requested path.
        path: String,
    },

    /// A route definition was rejected at registration time.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A static mount did not point at an existing directory.
    #[error("\"{path}\" is not a valid directory")]
    InvalidMount {
        /// The directory that was rejected.
        path: String,
    },

    /// A route handler reported a failure.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// I/O failure on the client connection.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    /// Create a malformed request error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            reason: reason.into(),
        }
    }

    /// Create a length required error.
    pub fn length_required(reason: impl Into<String>) -> Self {
        Self::LengthRequired {
            reason: reason.into(),
        }
    }

    /// Create an unsupported media type error.
    pub fn unsupported_media_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedMediaType {
            content_type: content_type.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid mount error.
    pub fn invalid_mount(path: impl Into<String>) -> Self {
        Self::InvalidMount { path: path.into() }
    }

    /// Returns the status code to answer with, or `None` when the
    /// connection must be dropped without a response.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::LengthRequired { .. } => Some(StatusCode::LENGTH_REQUIRED),
            Self::UnsupportedMediaType { .. } => Some(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::Handler(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            Self::MalformedRequest { .. }
            | Self::InvalidPattern { .. }
            | Self::InvalidMount { .. }
            | Self::Io(_) => None,
        }
    }
}

/// Failure reported by an application handler.
///
/// Handlers return `Result<_, E>` where `E: Into<HandlerError>`; the
/// dispatcher logs the message and answers with 500.
#[derive(Debug, Error)]
#[error("handler failed: {message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error from any displayable value.
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err)
    }
}

impl From<crate::template::RenderError> for HandlerError {
    fn from(err: crate::template::RenderError) -> Self {
        Self::new(err)
    }
}
