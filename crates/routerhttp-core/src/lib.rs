//! # routerhttp Core
//!
//! Request, response and error types shared by every routerhttp crate.
//!
//! - [`Request`] / [`Body`] - a parsed request with lower-cased headers
//! - [`Response`] - the mutable response a handler fills in
//! - [`HttpContext`] - the pair handed to route and status handlers
//! - [`IntoStatus`] - what a handler may return
//! - [`RouterError`] - the HTTP-side error taxonomy
//! - [`url_decode`], [`parse_query`], [`parse_form`] - percent-decoding helpers
//! - [`content_type_for`] - the extension to content-type table
//! - [`TemplateRenderer`] - pluggable template engine seam

#![doc(html_root_url = "https://docs.rs/routerhttp-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod encoding;
mod error;
mod mime;
mod request;
mod response;
pub mod template;

pub use context::{HttpContext, IntoStatus};
pub use encoding::{parse_form, parse_query, url_decode, Params};
pub use error::{HandlerError, RouterError, RouterResult};
pub use mime::{content_type_for, DEFAULT_CONTENT_TYPE};
pub use request::{Body, Request};
pub use response::{read_regular_file, Response, DEFAULT_RESPONSE_CONTENT_TYPE};
pub use template::{html_escape, RenderError, SubstitutionRenderer, TemplateRenderer};

pub use http::{Method, StatusCode};
