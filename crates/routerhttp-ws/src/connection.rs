//! WebSocket connection handling.
//!
//! A [`WebSocketConnection`] is shared between the connection registry and
//! the per-port handler task. Its state machine is one-way:
//!
//! ```text
//! OPEN ──(peer close | I/O error | heartbeat | close())──► CLOSED
//! ```
//!
//! Once closed, `recv` and `send` fail with [`WsError::ConnectionClosed`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{WsError, WsResult};
use crate::manager::ConnectionRegistry;
use crate::message::Frame;
use crate::transport::FrameTransport;

/// A unique identifier for a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new time-ordered connection ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live (or formerly live) WebSocket connection.
///
/// # Example
///
/// ```ignore
/// use routerhttp_ws::WebSocketConnection;
/// use std::sync::Arc;
///
/// async fn echo(conn: Arc<WebSocketConnection>) {
///     while let Ok(Some(text)) = conn.recv().await {
///         if conn.send(format!("echo: {text}")).await.is_err() {
///             break;
///         }
///     }
/// }
/// ```
pub struct WebSocketConnection {
    id: ConnectionId,
    remote_addr: Option<SocketAddr>,
    headers: IndexMap<String, String>,
    transport: Arc<dyn FrameTransport>,
    /// Set when closure has been observed, by any path.
    closed: AtomicBool,
    /// Set once the transport has been closed and the registry entry dropped.
    released: AtomicBool,
    registry: Weak<ConnectionRegistry>,
    opened_at: Instant,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl WebSocketConnection {
    pub(crate) fn new(
        transport: Arc<dyn FrameTransport>,
        remote_addr: Option<SocketAddr>,
        headers: IndexMap<String, String>,
        registry: Weak<ConnectionRegistry>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            headers,
            transport,
            closed: AtomicBool::new(false),
            released: AtomicBool::new(false),
            registry,
            opened_at: Instant::now(),
        }
    }

    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Address of the peer, when known.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Handshake headers, keyed by lower-cased name.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Looks up a handshake header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// How long this connection has been open.
    pub fn connection_duration(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }

    /// Check if the connection is closed, or its socket is known dead.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.transport.is_closed()
    }

    /// Liveness signal reporting the peer gone.
    ///
    /// Marks the connection closed without doing I/O; the next `recv`,
    /// `send` or reaper sweep finishes the close. [`TungsteniteTransport`]
    /// detects a vanished peer by itself; this is for callers that learn
    /// about it some other way.
    ///
    /// [`TungsteniteTransport`]: crate::TungsteniteTransport
    pub fn heartbeat(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(connection_id = %self.id, "Heartbeat reported dead socket");
        }
    }

    /// Receive the next frame as text.
    ///
    /// Waits for the next data frame. Returns `Ok(None)` when the peer closes
    /// the stream or the read fails; the connection is closed in both cases.
    /// Binary frames must be valid UTF-8.
    pub async fn recv(&self) -> WsResult<Option<String>> {
        match self.recv_frame().await? {
            Some(Frame::Text(text)) => Ok(Some(text)),
            Some(Frame::Binary(bytes)) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| WsError::DecodeFailed(e.to_string())),
            None => Ok(None),
        }
    }

    /// Receive the next frame as raw bytes.
    ///
    /// Same closing rules as [`recv`](Self::recv).
    pub async fn recv_bytes(&self) -> WsResult<Option<Bytes>> {
        Ok(self.recv_frame().await?.map(Frame::into_bytes))
    }

    #[instrument(skip(self), fields(connection_id = %self.id))]
    async fn recv_frame(&self) -> WsResult<Option<Frame>> {
        if self.released.load(Ordering::SeqCst) {
            return Err(WsError::ConnectionClosed);
        }
        // A dead transport still hands out frames it queued before the peer
        // left, so only a local close or heartbeat stops reading here.
        if self.closed.load(Ordering::SeqCst) {
            self.close().await;
            return Ok(None);
        }

        match self.transport.read().await {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.close().await;
                Ok(None)
            }
            Err(e) => {
                debug!(error = %e, "Read failed");
                self.close().await;
                Ok(None)
            }
        }
    }

    /// Send a text frame.
    pub async fn send(&self, text: impl Into<String>) -> WsResult<()> {
        self.send_frame(Frame::Text(text.into())).await
    }

    /// Send a binary frame.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> WsResult<()> {
        self.send_frame(Frame::Binary(data.into())).await
    }

    /// Send a frame. A write failure closes the connection.
    #[instrument(skip(self, frame), fields(connection_id = %self.id, len = frame.len()))]
    pub async fn send_frame(&self, frame: Frame) -> WsResult<()> {
        if self.is_closed() {
            self.close().await;
            return Err(WsError::ConnectionClosed);
        }

        if let Err(e) = self.transport.write(frame).await {
            debug!(error = %e, "Write failed");
            self.close().await;
            return Err(WsError::send_failed(e.to_string()));
        }
        Ok(())
    }

    pub(crate) async fn ping(&self) -> std::io::Result<()> {
        self.transport.ping().await
    }

    /// Close the connection.
    ///
    /// Closes the transport and removes the connection from its registry.
    /// Closing an already-closed connection does nothing.
    pub async fn close(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed.store(true, Ordering::SeqCst);

        if let Err(e) = self.transport.close().await {
            debug!(connection_id = %self.id, error = %e, "Transport close failed");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }

        info!(
            connection_id = %self.id,
            remote_addr = ?self.remote_addr,
            duration_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn detached(transport: Arc<MockTransport>) -> WebSocketConnection {
        WebSocketConnection::new(transport, None, IndexMap::new(), Weak::new())
    }

    #[test]
    fn test_connection_id_new() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string(), id1.as_uuid().to_string());
    }

    #[tokio::test]
    async fn test_recv_text_and_bytes() {
        let transport = MockTransport::with_frames([Frame::text("hi"), Frame::binary(&b"\x00\x01"[..])]);
        let conn = detached(transport);

        assert_eq!(conn.recv().await.unwrap(), Some("hi".to_string()));
        assert_eq!(
            conn.recv_bytes().await.unwrap(),
            Some(Bytes::from_static(b"\x00\x01"))
        );
    }

    #[tokio::test]
    async fn test_recv_invalid_utf8_is_not_fatal() {
        let transport = MockTransport::with_frames([Frame::binary(&b"\xff"[..]), Frame::text("ok")]);
        let conn = detached(transport);

        assert!(matches!(conn.recv().await, Err(WsError::DecodeFailed(_))));
        assert!(!conn.is_closed());
        assert_eq!(conn.recv().await.unwrap(), Some("ok".to_string()));
    }

    #[tokio::test]
    async fn test_end_of_stream_closes_then_errors() {
        let transport = MockTransport::with_frames([]);
        let conn = detached(Arc::clone(&transport));

        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(conn.is_closed());
        assert!(transport.close_calls() >= 1);
        assert!(matches!(conn.recv().await, Err(WsError::ConnectionClosed)));
        assert!(matches!(conn.send("x").await, Err(WsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_error_closes() {
        let transport = MockTransport::with_frames([]);
        transport.fail_reads();
        let conn = detached(transport);

        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_send_failure_closes() {
        let transport = MockTransport::with_frames([]);
        transport.fail_writes();
        let conn = detached(transport);

        assert!(matches!(conn.send("x").await, Err(WsError::SendFailed(_))));
        assert!(conn.is_closed());
        assert!(matches!(conn.send("y").await, Err(WsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_send_records_frames() {
        let transport = MockTransport::with_frames([]);
        let conn = detached(Arc::clone(&transport));

        conn.send("one").await.unwrap();
        conn.send_binary(vec![1u8, 2]).await.unwrap();
        assert_eq!(
            transport.written(),
            vec![Frame::text("one"), Frame::binary(vec![1u8, 2])]
        );
    }

    #[tokio::test]
    async fn test_heartbeat_marks_closed() {
        let transport = MockTransport::with_frames([Frame::text("never read")]);
        let conn = detached(Arc::clone(&transport));

        conn.heartbeat();
        assert!(conn.is_closed());
        assert_eq!(transport.close_calls(), 0);

        assert_eq!(conn.recv().await.unwrap(), None);
        assert_eq!(transport.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_frames_queued_before_peer_left_are_read() {
        let transport = MockTransport::with_frames([Frame::text("bye")]);
        let conn = detached(Arc::clone(&transport));

        transport.drop_peer();
        assert!(conn.is_closed());
        assert_eq!(conn.recv().await.unwrap(), Some("bye".to_string()));
        assert_eq!(conn.recv().await.unwrap(), None);
        assert!(matches!(conn.recv().await, Err(WsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = MockTransport::with_frames([]);
        let conn = detached(Arc::clone(&transport));

        conn.close().await;
        conn.close().await;
        assert_eq!(transport.close_calls(), 1);
        assert!(conn.is_closed());
    }

    #[test]
    fn test_headers_lookup() {
        let mut headers = IndexMap::new();
        headers.insert("sec-websocket-key".to_string(), "abc".to_string());
        let conn = WebSocketConnection::new(
            MockTransport::with_frames([]),
            Some("127.0.0.1:9000".parse().unwrap()),
            headers,
            Weak::new(),
        );

        assert_eq!(conn.header("Sec-WebSocket-Key"), Some("abc"));
        assert_eq!(conn.remote_addr().unwrap().port(), 9000);
    }
}
