//! WebSocket support for the routerhttp embedded server.
//!
//! This crate owns everything that happens on a WebSocket listener once a
//! TCP connection has been accepted: the opening handshake, the process-wide
//! registry of live connections, admission control, broadcast and the
//! reaping sweep that evicts dead sockets.
//!
//! # Features
//!
//! - **RFC 6455 handshake** performed directly on the accepted stream
//! - **Admission control** rejecting handshakes with `503` once the ceiling is reached
//! - **Broadcast** to every live connection, continuing past individual failures
//! - **Reaping sweep** on a fixed interval, with an optional keep-alive ping
//! - **Pluggable framing** behind the [`FrameTransport`] trait, backed by `tokio-tungstenite`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use routerhttp_ws::{accept_connection, ConnectionRegistry, WebSocketConfig};
//! use tokio::net::TcpListener;
//!
//! let registry = ConnectionRegistry::new(100);
//! tokio::spawn(Arc::clone(&registry).run_reaper());
//!
//! let listener = TcpListener::bind("0.0.0.0:9001").await?;
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     let registry = Arc::clone(&registry);
//!     tokio::spawn(async move {
//!         let config = WebSocketConfig::default();
//!         if let Ok(conn) = accept_connection(stream, Some(addr), &registry, &config).await {
//!             while let Ok(Some(text)) = conn.recv().await {
//!                 registry.broadcast(text).await;
//!             }
//!         }
//!     });
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WebSocket Flow                          │
//! │                                                             │
//! │  TCP accept ──► try_reserve()? ──no──► 503, close           │
//! │                     │ slot                                  │
//! │                     ▼                                       │
//! │  read head ──► Sec-WebSocket-Key ──► 101 + accept key       │
//! │                     │                                       │
//! │                     ▼                                       │
//! │  AdmissionSlot::open() ──► handler(conn)                    │
//! │                     │                                       │
//! │  recv()/send() ◄────┘        reaper: sweep() every tick     │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  close() ──► transport closed, registry entry removed       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/routerhttp-ws/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod manager;
mod message;
mod transport;
mod upgrade;

#[cfg(test)]
mod testing;

pub use config::{RegistryConfig, WebSocketConfig};
pub use connection::{ConnectionId, WebSocketConnection};
pub use error::{WsError, WsResult};
pub use manager::{AdmissionSlot, ConnectionRegistry, RegistryStats};
pub use message::Frame;
pub use transport::{FrameTransport, TungsteniteTransport};
pub use upgrade::{accept_connection, compute_accept_key, WEBSOCKET_GUID};
