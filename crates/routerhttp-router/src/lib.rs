//! Route registry for routerhttp.
//!
//! Application code fills a [`RouteRegistry`] during startup:
//!
//! - **routes**: a method set, a regular expression anchored over the whole
//!   URL path, and a handler receiving the captured groups
//! - **status handlers**: run after dispatch when the final status matches
//! - **static mounts**: URL prefixes served straight from a directory
//! - **WebSocket handlers**: one per listening port
//!
//! Registration order is match priority. The first route whose method set
//! contains the request method and whose pattern matches wins, whatever its
//! specificity.
//!
//! # Example
//!
//! ```rust
//! use routerhttp_router::RouteRegistry;
//! use http::{Method, StatusCode};
//!
//! let mut registry = RouteRegistry::new();
//! registry
//!     .add_route("GET", r"/users/(\d+)", |ctx, args| {
//!         ctx.response_mut().set_body(format!("user {}", args[0]));
//!         StatusCode::OK
//!     })
//!     .unwrap();
//! registry.add_status_handler(StatusCode::NOT_FOUND, |ctx| {
//!     ctx.response_mut().set_body("<h1>Not here</h1>");
//! });
//!
//! let found = registry.match_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(found.captures, vec!["42".to_string()]);
//! assert!(registry.match_route(&Method::GET, "/users/x").is_none());
//! ```

#![doc(html_root_url = "https://docs.rs/routerhttp-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod registry;
mod route;

pub use registry::{RouteMatch, RouteRegistry, StaticMount, StatusHandler, WebSocketHandler};
pub use route::{IntoMethodSet, MethodSet, Route, RouteHandler};
