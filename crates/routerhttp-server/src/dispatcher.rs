//! Request dispatch.
//!
//! The [`Dispatcher`] turns a parsed request into a status code and a filled
//! response:
//!
//! 1. `GET` requests under a static mount are answered from disk and never
//!    reach the dynamic routes.
//! 2. Otherwise the first route accepting the method and URL runs.
//! 3. The status handler registered for the resulting code, if any, runs
//!    last.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use http::{Method, StatusCode};
use routerhttp_core::{
    content_type_for, read_regular_file, HttpContext, Request, SubstitutionRenderer,
    TemplateRenderer,
};
use routerhttp_router::{RouteRegistry, StaticMount};
use tracing::{debug, error, instrument};

/// Resolves requests against a [`RouteRegistry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher using the substitution template renderer.
    pub fn new(registry: Arc<RouteRegistry>) -> Self {
        Self {
            registry,
            renderer: Arc::new(SubstitutionRenderer),
        }
    }

    /// Replaces the template renderer handed to every context.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// The registry requests are resolved against.
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    /// Wraps a request in a fresh context.
    pub fn context(&self, request: Request) -> HttpContext {
        HttpContext::with_renderer(request, Arc::clone(&self.renderer))
    }

    /// Resolves the request in `ctx`, filling its response.
    #[instrument(skip(self, ctx), fields(method = %ctx.request().method(), url = ctx.request().url()))]
    pub async fn dispatch(&self, ctx: &mut HttpContext) -> StatusCode {
        if ctx.request().method() == Method::GET {
            match self.resolve_static(ctx).await {
                Some(StatusCode::OK) => return StatusCode::OK,
                Some(status) => {
                    self.run_status_handler(status, ctx);
                    return status;
                }
                None => {}
            }
        }

        let status = self.dispatch_route(ctx);
        self.run_status_handler(status, ctx);
        status
    }

    /// Serves the request from the first static mount whose prefix matches
    /// the URL.
    ///
    /// Returns `None` when no mount prefix matches, `Some(OK)` with the file
    /// loaded into the response, or `Some(NOT_FOUND)` when the file is
    /// missing or not a regular file.
    pub async fn resolve_static(&self, ctx: &mut HttpContext) -> Option<StatusCode> {
        let (mount, suffix) = self
            .registry
            .static_mounts()
            .find_map(|mount| mount.strip(ctx.request().url()).map(|s| (mount, s)))?;

        let Some(path) = static_path(mount, suffix) else {
            debug!(prefix = mount.prefix(), suffix, "rejected static path");
            return Some(StatusCode::NOT_FOUND);
        };

        match read_regular_file(&path).await {
            Ok(data) => {
                let len = data.len();
                let response = ctx.response_mut();
                response.set_body(data);
                response.set_content_type(content_type_for(&path));
                response.insert_header("Content-Length", len.to_string());
                Some(StatusCode::OK)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "static file unavailable");
                Some(StatusCode::NOT_FOUND)
            }
        }
    }

    fn dispatch_route(&self, ctx: &mut HttpContext) -> StatusCode {
        let method = ctx.request().method().clone();
        let Some(found) = self.registry.match_route(&method, ctx.request().url()) else {
            return StatusCode::NOT_FOUND;
        };

        match (found.route.handler())(ctx, found.captures.as_slice()) {
            Ok(status) => status,
            Err(e) => {
                error!(pattern = found.route.pattern(), error = %e, "route handler failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn run_status_handler(&self, status: StatusCode, ctx: &mut HttpContext) {
        if let Some(handler) = self.registry.status_handler(status) {
            debug!(status = status.as_u16(), "running status handler");
            handler(ctx);
        }
    }
}

/// Joins a URL suffix onto the mount directory, refusing `..` segments.
fn static_path(mount: &StaticMount, suffix: &str) -> Option<PathBuf> {
    let relative = Path::new(suffix.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(mount.directory().join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use routerhttp_core::HandlerError;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicUsize>);

    impl Counter {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn get(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn get(url: &str) -> HttpContext {
        HttpContext::new(Request::new(Method::GET, url))
    }

    async fn dispatch(registry: RouteRegistry, ctx: &mut HttpContext) -> StatusCode {
        Dispatcher::new(Arc::new(registry)).dispatch(ctx).await
    }

    fn static_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.CSS"), "body{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_static_file_served() {
        let dir = static_dir();
        let mut registry = RouteRegistry::new();
        registry.mount(dir.path(), "/static").unwrap();

        let mut ctx = get("/static/css/site.CSS");
        let status = dispatch(registry, &mut ctx).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(&ctx.response().body()[..], b"body{}");
        assert_eq!(ctx.response().content_type(), "text/css");
        assert_eq!(
            ctx.response().headers().get("Content-Length").map(String::as_str),
            Some("6")
        );
    }

    #[tokio::test]
    async fn test_static_miss_runs_not_found_handler_and_skips_routes() {
        let dir = static_dir();
        let not_found = Counter::default();
        let route_hits = Counter::default();

        let mut registry = RouteRegistry::new();
        registry.mount(dir.path(), "/static").unwrap();
        let hits = route_hits.clone();
        registry
            .add_route("GET", "/static/.*", move |_ctx: &mut HttpContext, _args: &[String]| {
                hits.hit();
                StatusCode::OK
            })
            .unwrap();
        let seen = not_found.clone();
        registry.add_status_handler(StatusCode::NOT_FOUND, move |ctx: &mut HttpContext| {
            seen.hit();
            ctx.response_mut().set_body("missing");
        });

        let dispatcher = Dispatcher::new(Arc::new(registry));
        for url in ["/static/nope.txt", "/static/css", "/static/../secret"] {
            let mut ctx = get(url);
            assert_eq!(dispatcher.dispatch(&mut ctx).await, StatusCode::NOT_FOUND);
            assert_eq!(&ctx.response().body()[..], b"missing");
        }
        assert_eq!(not_found.get(), 3);
        assert_eq!(route_hits.get(), 0);
    }

    #[tokio::test]
    async fn test_static_ignored_for_post() {
        let dir = static_dir();
        let mut registry = RouteRegistry::new();
        registry.mount(dir.path(), "/static").unwrap();

        let mut ctx = HttpContext::new(Request::new(Method::POST, "/static/index.html"));
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::NOT_FOUND);
        assert!(ctx.response().body().is_empty());
    }

    #[tokio::test]
    async fn test_route_with_captures() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("GET", r"/user/(\d+)(/edit)?", |ctx: &mut HttpContext, args: &[String]| {
                ctx.response_mut().set_body(args.join(","));
                StatusCode::OK
            })
            .unwrap();

        let mut ctx = get("/user/42");
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::OK);
        assert_eq!(&ctx.response().body()[..], b"42");
    }

    #[tokio::test]
    async fn test_first_registered_route_wins() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("GET", "/item/.*", |ctx: &mut HttpContext, _args: &[String]| {
                ctx.response_mut().set_body("general");
                StatusCode::OK
            })
            .unwrap();
        registry
            .add_route("GET", "/item/special", |ctx: &mut HttpContext, _args: &[String]| {
                ctx.response_mut().set_body("special");
                StatusCode::ACCEPTED
            })
            .unwrap();

        let mut ctx = get("/item/special");
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::OK);
        assert_eq!(&ctx.response().body()[..], b"general");
    }

    #[tokio::test]
    async fn test_method_mismatch_is_not_found() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("POST", "/submit", |_ctx: &mut HttpContext, _args: &[String]| {
                StatusCode::OK
            })
            .unwrap();

        let mut ctx = get("/submit");
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unit_handler_is_no_content() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("GET", "/ping", |_ctx: &mut HttpContext, _args: &[String]| {})
            .unwrap();

        let mut ctx = get("/ping");
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_handler_error_runs_500_handler() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("GET", "/boom", |_ctx: &mut HttpContext, _args: &[String]| {
                Err::<StatusCode, _>(HandlerError::new("exploded"))
            })
            .unwrap();
        registry.add_status_handler(StatusCode::INTERNAL_SERVER_ERROR, |ctx: &mut HttpContext| {
            ctx.response_mut().set_body("sorry");
        });

        let mut ctx = get("/boom");
        assert_eq!(
            dispatch(registry, &mut ctx).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(&ctx.response().body()[..], b"sorry");
    }

    #[tokio::test]
    async fn test_status_handler_runs_after_route() {
        let mut registry = RouteRegistry::new();
        registry
            .add_route("GET", "/gone", |ctx: &mut HttpContext, _args: &[String]| {
                ctx.response_mut().set_body("route");
                StatusCode::GONE
            })
            .unwrap();
        registry.add_status_handler(StatusCode::GONE, |ctx: &mut HttpContext| {
            let body = format!(
                "{}+status",
                String::from_utf8_lossy(ctx.response().body())
            );
            ctx.response_mut().set_body(body);
        });

        let mut ctx = get("/gone");
        assert_eq!(dispatch(registry, &mut ctx).await, StatusCode::GONE);
        assert_eq!(&ctx.response().body()[..], b"route+status");
    }

    #[test]
    fn test_static_path_rejects_parent_components() {
        let dir = static_dir();
        let mut registry = RouteRegistry::new();
        registry.mount(dir.path(), "/s").unwrap();
        let mount = registry.static_mounts().next().unwrap();

        assert_eq!(
            static_path(mount, "/css/site.CSS"),
            Some(dir.path().join("css/site.CSS"))
        );
        assert!(static_path(mount, "/../etc/passwd").is_none());
        assert!(static_path(mount, "/a/../../b").is_none());
    }
}
