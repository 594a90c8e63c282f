//! WebSocket opening handshake.
//!
//! This module performs the server side of the RFC 6455 opening handshake
//! directly on an accepted byte stream: admission control, header parsing,
//! accept key computation and the `101 Switching Protocols` response.

use std::net::SocketAddr;
use std::sync::Arc;

use base64::Engine;
use indexmap::IndexMap;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, instrument, warn};

use crate::config::WebSocketConfig;
use crate::connection::WebSocketConnection;
use crate::error::{WsError, WsResult};
use crate::manager::ConnectionRegistry;
use crate::transport::TungsteniteTransport;

/// The WebSocket magic GUID used in the handshake.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Response sent when admission control refuses a handshake.
const TOO_MANY_CONNECTIONS: &[u8] = b"HTTP/1.1 503 Too many connections\r\n\r\n";

/// Upper bound on the handshake request head.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Compute the `Sec-WebSocket-Accept` value for a `Sec-WebSocket-Key`.
///
/// # Example
///
/// ```
/// use routerhttp_ws::compute_accept_key;
///
/// assert_eq!(
///     compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    let result = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(result)
}

/// Run the opening handshake on a freshly accepted stream and register the
/// resulting connection.
///
/// Room in the registry is reserved before the request head is read, so
/// overlapping handshakes can never all be answered with `101`. When no room
/// is left, a `503` status line is written and the stream is shut down. Any
/// other failure drops the stream and releases the reservation.
#[instrument(skip(stream, registry, config), fields(remote_addr = ?remote_addr))]
pub async fn accept_connection<S>(
    mut stream: S,
    remote_addr: Option<SocketAddr>,
    registry: &Arc<ConnectionRegistry>,
    config: &WebSocketConfig,
) -> WsResult<Arc<WebSocketConnection>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Some(slot) = registry.try_reserve() else {
        let limit = registry.max_connections();
        registry.record_rejected();
        warn!(limit, "Rejecting WebSocket connection: limit reached");

        if let Err(e) = stream.write_all(TOO_MANY_CONNECTIONS).await {
            debug!(error = %e, "Failed to write rejection");
        }
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Failed to shut down rejected stream");
        }
        return Err(WsError::too_many_connections(limit));
    };

    let handshake = handshake(stream);
    let (stream, headers) = match config.handshake_timeout {
        Some(timeout) => tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| WsError::HandshakeTimeout)??,
        None => handshake.await?,
    };

    let transport = TungsteniteTransport::from_raw_socket(stream, config).await;
    Ok(slot.open(Arc::new(transport), remote_addr, headers))
}

/// Reads the request head and answers with `101 Switching Protocols`.
///
/// The buffered reader is handed back so bytes the peer sent after the
/// head are not lost.
async fn handshake<S>(stream: S) -> WsResult<(BufReader<S>, IndexMap<String, String>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let mut head_bytes = 0;

    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(WsError::handshake_failed("connection closed before request line"));
    }
    head_bytes += n;
    debug!(request_line = line.trim_end(), "WebSocket handshake started");

    let mut headers = IndexMap::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(WsError::handshake_failed("connection closed inside headers"));
        }
        head_bytes += n;
        if head_bytes > MAX_HEAD_BYTES {
            return Err(WsError::handshake_failed("request head too large"));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| WsError::handshake_failed(format!("malformed header line {trimmed:?}")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let key = headers
        .get("sec-websocket-key")
        .filter(|k| !k.is_empty())
        .ok_or_else(|| WsError::handshake_failed("missing Sec-WebSocket-Key header"))?;
    let accept = compute_accept_key(key);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    reader.write_all(response.as_bytes()).await?;
    reader.flush().await?;

    Ok((reader, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_compute_accept_key() {
        // RFC 6455 section 1.3
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[tokio::test]
    async fn test_accept_with_client() {
        let registry = ConnectionRegistry::new(-1);
        let (server, client) = tokio::io::duplex(4096);

        let server_registry = Arc::clone(&registry);
        let accept = tokio::spawn(async move {
            accept_connection(server, None, &server_registry, &WebSocketConfig::default()).await
        });

        let (mut client, response) = tokio_tungstenite::client_async("ws://localhost/chat", client)
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 101);

        let conn = accept.await.unwrap().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(conn.header("host"), Some("localhost"));

        client
            .send(tungstenite::Message::Text("hello".to_string().into()))
            .await
            .unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some("hello".to_string()));

        conn.send("world").await.unwrap();
        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(reply.into_text().unwrap().as_str(), "world");

        conn.close().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_raw_handshake_response() {
        let registry = ConnectionRegistry::new(-1);
        let (server, mut client) = tokio::io::duplex(4096);

        client
            .write_all(
                b"GET / HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                  Sec-WebSocket-Version: 13\r\n\r\n",
            )
            .await
            .unwrap();

        let conn = accept_connection(server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap();

        let mut buf = vec![0u8; 256];
        let n = client.read(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(registry.contains(conn.id()));
    }

    #[tokio::test]
    async fn test_missing_key_fails() {
        let registry = ConnectionRegistry::new(-1);
        let (server, mut client) = tokio::io::duplex(4096);
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let err = accept_connection(server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::HandshakeFailed(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_header_fails() {
        let registry = ConnectionRegistry::new(-1);
        let (server, mut client) = tokio::io::duplex(4096);
        client
            .write_all(b"GET / HTTP/1.1\r\nnot a header\r\n\r\n")
            .await
            .unwrap();

        let err = accept_connection(server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn test_full_registry_rejects_with_503() {
        let registry = ConnectionRegistry::new(1);
        registry
            .open(MockTransport::with_frames([]), None, IndexMap::new())
            .unwrap();

        let (server, mut client) = tokio::io::duplex(4096);
        let err = accept_connection(server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::TooManyConnections { limit: 1 }));

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert_eq!(response, "HTTP/1.1 503 Too many connections\r\n\r\n");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().total_rejected, 1);
    }

    const HANDSHAKE: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[tokio::test]
    async fn test_overlapping_handshakes_respect_limit() {
        let registry = ConnectionRegistry::new(1);

        // The first handshake holds the only slot while its client is silent.
        let (first_server, mut first_client) = tokio::io::duplex(4096);
        let first_registry = Arc::clone(&registry);
        let first = tokio::spawn(async move {
            accept_connection(first_server, None, &first_registry, &WebSocketConfig::default())
                .await
        });
        tokio::time::timeout(Duration::from_secs(1), async {
            while !registry.is_enough() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first handshake should reserve the slot");

        let (second_server, mut second_client) = tokio::io::duplex(4096);
        second_client.write_all(HANDSHAKE).await.unwrap();
        let err = accept_connection(second_server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::TooManyConnections { limit: 1 }));

        let mut rejected = String::new();
        second_client.read_to_string(&mut rejected).await.unwrap();
        assert_eq!(rejected, "HTTP/1.1 503 Too many connections\r\n\r\n");

        first_client.write_all(HANDSHAKE).await.unwrap();
        let conn = first.await.unwrap().unwrap();
        let mut buf = vec![0u8; 256];
        let n = first_client.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 101 Switching Protocols\r\n"));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(conn.id()));
        assert_eq!(registry.stats().total_rejected, 1);
    }

    #[tokio::test]
    async fn test_vanished_peer_is_reaped_with_default_config() {
        let registry = ConnectionRegistry::new(1);
        let (server, client) = tokio::io::duplex(4096);

        let server_registry = Arc::clone(&registry);
        let accept = tokio::spawn(async move {
            accept_connection(server, None, &server_registry, &WebSocketConfig::default()).await
        });
        let (client, _) = tokio_tungstenite::client_async("ws://localhost/", client)
            .await
            .unwrap();
        let conn = accept.await.unwrap().unwrap();
        assert!(registry.is_enough());

        // Nobody ever reads from `conn`.
        drop(client);
        tokio::time::timeout(Duration::from_secs(1), async {
            while !conn.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("peer loss should be noticed without reads");

        assert_eq!(registry.sweep().await, 1);
        assert!(!registry.contains(conn.id()));
        assert!(!registry.is_enough());
    }

    #[tokio::test]
    async fn test_failed_handshake_releases_slot() {
        let registry = ConnectionRegistry::new(1);
        let (server, mut client) = tokio::io::duplex(4096);
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        accept_connection(server, None, &registry, &WebSocketConfig::default())
            .await
            .unwrap_err();
        assert!(!registry.is_enough());
        assert_eq!(registry.stats().total_rejected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let registry = ConnectionRegistry::new(-1);
        let (server, _client) = tokio::io::duplex(4096);
        let config = WebSocketConfig::new().handshake_timeout(Duration::from_secs(1));

        let err = accept_connection(server, None, &registry, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, WsError::HandshakeTimeout));
        assert!(registry.is_empty());
    }
}
