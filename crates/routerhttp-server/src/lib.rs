//! # routerhttp server
//!
//! The request path of the routerhttp embedded server: the HTTP/1.x request
//! parser, the dispatcher, the response writer and the orchestrator that
//! runs the HTTP listener, one listener per WebSocket port and the
//! connection reaper on a single Tokio runtime.
//!
//! - One request per connection; every response closes the socket
//! - Regex routes tried in registration order, static mounts first for `GET`
//! - Status handlers customize any response by status code
//! - Graceful shutdown on SIGTERM/SIGINT or a manual [`ShutdownSignal`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use routerhttp_router::RouteRegistry;
//! use routerhttp_server::{Server, ServerConfig, ShutdownSignal};
//!
//! let mut routes = RouteRegistry::new();
//! routes.mount("./public", "/static")?;
//!
//! let listening = Server::new(ServerConfig::default(), routes).bind().await?;
//! println!("serving on {}", listening.http_addr()?);
//! listening.serve(ShutdownSignal::with_os_signals()).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/routerhttp-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod error;
mod parser;
mod server;
mod shutdown;
mod writer;

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_WEBSOCKET_HOST};
pub use dispatcher::Dispatcher;
pub use error::{ServerError, ServerResult};
pub use parser::{parse_request, read_body, read_head};
pub use server::{serve_http_connection, Listening, Server};
pub use shutdown::{ShutdownReceiver, ShutdownSignal};
pub use writer::{response_head, send_response};
