//! Listener orchestration.
//!
//! A [`Server`] owns one HTTP listener, one listener per registered
//! WebSocket port and the connection reaper. Each accepted connection runs
//! on its own task; a slow or broken client never blocks the others.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use routerhttp_core::TemplateRenderer;
use routerhttp_router::{RouteRegistry, WebSocketHandler};
use routerhttp_ws::{accept_connection, ConnectionRegistry, WebSocketConfig, WsError};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::parser::{read_body, read_head};
use crate::shutdown::ShutdownSignal;
use crate::writer::send_response;

/// The embedded HTTP and WebSocket server.
///
/// # Example
///
/// ```rust,no_run
/// use routerhttp_router::RouteRegistry;
/// use routerhttp_server::{Server, ServerConfig};
/// use http::StatusCode;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut routes = RouteRegistry::new();
///     routes.add_route("GET", "/", |ctx, _| {
///         ctx.response_mut().set_body("hello");
///         StatusCode::OK
///     })?;
///
///     Server::new(ServerConfig::default(), routes).listen().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
    connections: Arc<ConnectionRegistry>,
}

impl Server {
    /// Creates a server for the given routes.
    pub fn new(config: ServerConfig, routes: RouteRegistry) -> Self {
        let connections = ConnectionRegistry::with_config(config.registry().clone());
        Self {
            config,
            dispatcher: Dispatcher::new(Arc::new(routes)),
            connections,
        }
    }

    /// Uses a connection registry created ahead of time, so WebSocket
    /// handlers can capture it for broadcasting.
    #[must_use]
    pub fn with_connections(mut self, connections: Arc<ConnectionRegistry>) -> Self {
        self.connections = connections;
        self
    }

    /// Replaces the template renderer handed to route handlers.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.dispatcher = self.dispatcher.with_renderer(renderer);
        self
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the WebSocket connection registry.
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Binds the HTTP listener and every WebSocket port.
    ///
    /// # Errors
    ///
    /// Fails if an address is invalid or a port cannot be bound.
    pub async fn bind(self) -> ServerResult<Listening> {
        let addr = self.config.socket_addr()?;
        let http = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {addr}: {e}")))?;
        info!(addr = %addr, "HTTP listening");

        let mut websockets = Vec::new();
        for (&port, handler) in self.dispatcher.registry().websocket_handlers() {
            let addr = self.config.websocket_addr(port)?;
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| ServerError::BindError(format!("Failed to bind to {addr}: {e}")))?;
            info!(port, addr = %addr, "WebSocket listening");
            websockets.push(WebSocketListener {
                port,
                listener,
                handler: Arc::clone(handler),
            });
        }

        Ok(Listening {
            config: self.config,
            dispatcher: Arc::new(self.dispatcher),
            connections: self.connections,
            http,
            websockets,
        })
    }

    /// Serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Fails if a listener cannot be bound.
    pub async fn listen(self) -> ServerResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Serves until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Fails if a listener cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        self.bind().await?.serve(shutdown).await
    }
}

struct WebSocketListener {
    port: u16,
    listener: TcpListener,
    handler: WebSocketHandler,
}

/// A server whose listeners are bound but not yet accepting.
///
/// Binding separately from serving lets callers learn the actual ports when
/// binding to port zero.
pub struct Listening {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
    connections: Arc<ConnectionRegistry>,
    http: TcpListener,
    websockets: Vec<WebSocketListener>,
}

impl std::fmt::Debug for Listening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listening")
            .field("http", &self.http.local_addr().ok())
            .field("websockets", &self.websocket_addrs())
            .finish_non_exhaustive()
    }
}

impl Listening {
    /// Local address of the HTTP listener.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// Registered port and local address of each WebSocket listener.
    pub fn websocket_addrs(&self) -> Vec<(u16, SocketAddr)> {
        self.websockets
            .iter()
            .filter_map(|ws| ws.listener.local_addr().ok().map(|addr| (ws.port, addr)))
            .collect()
    }

    /// Returns the WebSocket connection registry.
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Accepts connections until `shutdown` fires or a listener task ends,
    /// then closes every registered WebSocket connection.
    pub async fn serve(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let Self {
            config,
            dispatcher,
            connections,
            http,
            websockets,
        } = self;

        let mut tasks = JoinSet::new();
        tasks.spawn(accept_http(http, dispatcher, config.header_timeout()));
        for ws in websockets {
            tasks.spawn(accept_websocket(
                ws,
                Arc::clone(&connections),
                config.websocket().clone(),
            ));
        }
        tasks.spawn(Arc::clone(&connections).run_reaper());

        tokio::select! {
            _ = shutdown.recv() => {
                info!("Shutdown signal received, stopping server");
            }
            Some(result) = tasks.join_next() => {
                if let Err(e) = result {
                    error!(error = %e, "Listener task failed");
                }
            }
        }

        tasks.shutdown().await;
        let closed = connections.close_all().await;
        info!(closed, "Server stopped");
        Ok(())
    }
}

async fn accept_http(listener: TcpListener, dispatcher: Arc<Dispatcher>, header_timeout: Option<Duration>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    serve_http_connection(stream, Some(remote_addr), &dispatcher, header_timeout)
                        .await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn accept_websocket(ws: WebSocketListener, connections: Arc<ConnectionRegistry>, config: WebSocketConfig) {
    let WebSocketListener {
        port,
        listener,
        handler,
    } = ws;

    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let connections = Arc::clone(&connections);
                let handler = Arc::clone(&handler);
                let config = config.clone();
                tokio::spawn(async move {
                    match accept_connection(stream, Some(remote_addr), &connections, &config).await {
                        Ok(conn) => handler(conn).await,
                        // Already logged at admission.
                        Err(WsError::TooManyConnections { .. }) => {}
                        Err(e) => {
                            warn!(port, remote_addr = %remote_addr, error = %e, "WebSocket handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                error!(port, error = %e, "Failed to accept WebSocket connection");
            }
        }
    }
}

/// Serves one HTTP request on `stream`, then closes it.
///
/// Clients that send an unreadable request head, or none within
/// `header_timeout`, are disconnected without a response. A missing body
/// length or an unsupported body type is answered with 411 or 415 before
/// any route runs.
pub async fn serve_http_connection<S>(
    stream: S,
    remote_addr: Option<SocketAddr>,
    dispatcher: &Dispatcher,
    header_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);

    let head = match header_timeout {
        Some(limit) => match tokio::time::timeout(limit, read_head(&mut reader)).await {
            Ok(head) => head,
            Err(_) => {
                debug!(remote_addr = ?remote_addr, "Request head timed out");
                return;
            }
        },
        None => read_head(&mut reader).await,
    };

    let mut request = match head {
        Ok(request) => request,
        Err(e) => {
            debug!(remote_addr = ?remote_addr, error = %e, "Dropping connection");
            return;
        }
    };
    if let Some(addr) = remote_addr {
        request.set_remote_addr(addr);
    }

    let body = read_body(&mut reader, &mut request).await;
    let mut ctx = dispatcher.context(request);
    let status = match body {
        Ok(()) => dispatcher.dispatch(&mut ctx).await,
        Err(e) => match e.status_code() {
            Some(status) => {
                debug!(status = status.as_u16(), error = %e, "Rejecting request body");
                status
            }
            None => {
                debug!(remote_addr = ?remote_addr, error = %e, "Dropping connection");
                return;
            }
        },
    };

    send_response(reader.get_mut(), &ctx, status).await;
}
