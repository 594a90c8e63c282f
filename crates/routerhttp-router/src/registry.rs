//! The route registry.
//!
//! Built once during startup and frozen behind an `Arc` when the server
//! starts listening. Four tables live here:
//!
//! | Table | Key | Lookup |
//! |---|---|---|
//! | routes | pattern | registration order, first match wins |
//! | status handlers | status code | exact code |
//! | static mounts | URL prefix | registration order, first prefix wins |
//! | WebSocket handlers | port | one accept loop per port |

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use routerhttp_core::{HttpContext, IntoStatus, RouterError, RouterResult};
use routerhttp_ws::WebSocketConnection;

use crate::route::{IntoMethodSet, Route, RouteHandler};

/// Status handler: runs after dispatch when the status code matches.
pub type StatusHandler = Arc<dyn Fn(&mut HttpContext) + Send + Sync>;

/// WebSocket handler: owns a connection for its whole lifetime.
pub type WebSocketHandler =
    Arc<dyn Fn(Arc<WebSocketConnection>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A URL prefix served from a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMount {
    prefix: String,
    directory: PathBuf,
}

impl StaticMount {
    /// The URL prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The directory files are served from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns the part of `url` after the prefix, if the prefix matches.
    pub fn strip<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.prefix.as_str())
    }
}

/// Result of a successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The matching route.
    pub route: &'a Route,
    /// Captured groups, in order, without the non-participating ones.
    pub captures: Vec<String>,
}

/// Registration tables consulted by the dispatcher and the orchestrator.
///
/// # Example
///
/// ```rust
/// use routerhttp_router::RouteRegistry;
/// use http::{Method, StatusCode};
///
/// let mut registry = RouteRegistry::new();
/// registry
///     .add_route("GET", "/hello", |ctx, _| {
///         ctx.response_mut().set_body("hi");
///         StatusCode::OK
///     })
///     .unwrap();
///
/// let found = registry.match_route(&Method::GET, "/hello").unwrap();
/// assert_eq!(found.route.pattern(), "/hello");
/// ```
#[derive(Default)]
pub struct RouteRegistry {
    routes: IndexMap<String, Route>,
    status_handlers: HashMap<StatusCode, StatusHandler>,
    static_mounts: IndexMap<String, StaticMount>,
    websocket_handlers: BTreeMap<u16, WebSocketHandler>,
}

impl std::fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("status_handlers", &self.status_handlers.keys().collect::<Vec<_>>())
            .field("static_mounts", &self.static_mounts.values().collect::<Vec<_>>())
            .field("websocket_ports", &self.websocket_handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RouteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    ///
    /// `methods` is a [`MethodSet`](crate::MethodSet), a single
    /// [`Method`], an array of methods, or a string such as `"GET|POST"`.
    /// Registering an existing pattern again replaces its methods and
    /// handler but keeps its place in the match order. A pattern that is not
    /// a valid regular expression only matches its own text.
    pub fn add_route<M, F, R>(&mut self, methods: M, pattern: &str, handler: F) -> RouterResult<()>
    where
        M: IntoMethodSet,
        F: Fn(&mut HttpContext, &[String]) -> R + Send + Sync + 'static,
        R: IntoStatus,
    {
        let methods = methods.into_method_set()?;
        let handler: RouteHandler = Arc::new(move |ctx: &mut HttpContext, args: &[String]| {
            handler(ctx, args).into_status()
        });

        if let Some(existing) = self.routes.get_mut(pattern) {
            tracing::debug!(pattern, methods = %methods, "route replaced");
            existing.replace(methods, handler);
            return Ok(());
        }

        let route = Route::new(methods, pattern, handler);
        tracing::debug!(pattern, methods = %route.methods(), "route registered");
        self.routes.insert(pattern.to_string(), route);
        Ok(())
    }

    /// Registers a handler run whenever dispatch ends with `status`.
    pub fn add_status_handler<F>(&mut self, status: StatusCode, handler: F)
    where
        F: Fn(&mut HttpContext) + Send + Sync + 'static,
    {
        self.status_handlers.insert(status, Arc::new(handler));
    }

    /// Serves `directory` under the URL `prefix`.
    ///
    /// An empty prefix uses the directory path itself. Fails unless
    /// `directory` exists and is a directory.
    pub fn mount(&mut self, directory: impl AsRef<Path>, prefix: &str) -> RouterResult<()> {
        let directory = directory.as_ref();
        let is_dir = std::fs::metadata(directory)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(RouterError::invalid_mount(directory.display().to_string()));
        }

        let prefix = if prefix.is_empty() {
            directory.to_string_lossy().into_owned()
        } else {
            prefix.to_string()
        };

        tracing::debug!(prefix = %prefix, directory = %directory.display(), "static mount");
        self.static_mounts.insert(
            prefix.clone(),
            StaticMount {
                prefix,
                directory: directory.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Registers the handler for WebSocket connections accepted on `port`.
    pub fn add_websocket<F, Fut>(&mut self, port: u16, handler: F)
    where
        F: Fn(Arc<WebSocketConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: WebSocketHandler =
            Arc::new(move |conn: Arc<WebSocketConnection>| handler(conn).boxed());
        self.websocket_handlers.insert(port, handler);
    }

    /// Routes in match order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    /// Finds the first route accepting `method` and `url`.
    pub fn match_route(&self, method: &Method, url: &str) -> Option<RouteMatch<'_>> {
        self.routes.values().find_map(|route| {
            route
                .matches(method, url)
                .map(|captures| RouteMatch { route, captures })
        })
    }

    /// The handler registered for `status`, if any.
    pub fn status_handler(&self, status: StatusCode) -> Option<&StatusHandler> {
        self.status_handlers.get(&status)
    }

    /// Static mounts in registration order.
    pub fn static_mounts(&self) -> impl Iterator<Item = &StaticMount> {
        self.static_mounts.values()
    }

    /// WebSocket handlers by port.
    pub fn websocket_handlers(&self) -> &BTreeMap<u16, WebSocketHandler> {
        &self.websocket_handlers
    }
}
