//! # routerhttp
//!
//! **An embeddable HTTP/1.x and WebSocket server**
//!
//! - **Regex routing** – routes are anchored patterns tried in registration order
//! - **Static mounts** – URL prefixes served straight from a directory
//! - **Status handlers** – customize any response by its status code
//! - **WebSockets** – one listener per port, a shared connection registry with
//!   admission control, broadcast and a reaper for dead connections
//! - **Layered configuration** – defaults, TOML/JSON file, `.env`, environment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routerhttp::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = RouteRegistry::new();
//!     routes.add_route("GET", r"/hello/(\w+)", |ctx: &mut HttpContext, args: &[String]| {
//!         ctx.response_mut().set_body(format!("hello {}", args[0]));
//!         StatusCode::OK
//!     })?;
//!     routes.add_websocket(9001, |conn: Arc<WebSocketConnection>| async move {
//!         while let Ok(Some(text)) = conn.recv().await {
//!             let _ = conn.send(text).await;
//!         }
//!     });
//!
//!     Server::new(ServerConfig::default(), routes).listen().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! accept ─► parse head ─► read body (POST) ─► static mount? ─► route ─► status handler
//!                                                                          │
//!                          close ◄── access log ◄── write response ◄──────┘
//! ```

#![doc(html_root_url = "https://docs.rs/routerhttp/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Crate version, as reported by the demo binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core types
pub use routerhttp_core as core;

// Re-export router types
pub use routerhttp_router as router;

// Re-export WebSocket types
pub use routerhttp_ws as ws;

// Re-export server types
pub use routerhttp_server as server;

// Re-export configuration types
pub use routerhttp_config as config;

// Re-export telemetry types
pub use routerhttp_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use routerhttp::prelude::*;
///
/// let mut routes = RouteRegistry::new();
/// routes
///     .add_route("GET", "/", |ctx: &mut HttpContext, _args: &[String]| {
///         ctx.response_mut().set_body("hi");
///         StatusCode::OK
///     })
///     .unwrap();
/// assert_eq!(routes.routes().count(), 1);
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use routerhttp_core::{
        Body, HandlerError, HttpContext, IntoStatus, Method, Request, Response, RouterError,
        RouterResult, StatusCode,
    };

    pub use routerhttp_router::{MethodSet, RouteRegistry};

    pub use routerhttp_ws::{
        ConnectionId, ConnectionRegistry, Frame, WebSocketConnection, WsError, WsResult,
    };

    pub use routerhttp_server::{Server, ServerConfig, ServerError, ShutdownSignal};

    pub use routerhttp_config::{ConfigLoader, RouterHttpConfig};
}
