//! WebSocket data frames.

use bytes::Bytes;

/// A data frame exchanged with the peer.
///
/// Control frames (ping, pong, close) never surface here; the transport
/// handles them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame (UTF-8).
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Create a new text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a new binary frame.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the payload as text, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Convert the frame into its raw payload.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(s) => Bytes::from(s),
            Self::Binary(b) => b,
        }
    }

    /// Convert a tungstenite message, keeping only data frames.
    pub fn from_message(msg: tungstenite::Message) -> Option<Self> {
        match msg {
            tungstenite::Message::Text(s) => Some(Self::Text(s.to_string())),
            tungstenite::Message::Binary(b) => Some(Self::Binary(b)),
            _ => None,
        }
    }
}

impl From<Frame> for tungstenite::Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(s) => Self::Text(s.into()),
            Frame::Binary(b) => Self::Binary(b),
        }
    }
}

impl From<String> for Frame {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Frame {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Bytes> for Frame {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}
