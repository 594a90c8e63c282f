//! Parsed HTTP request.

use std::net::SocketAddr;

use http::Method;
use serde_json::Value;

use crate::encoding::Params;

/// Decoded request body.
///
/// Only `POST` requests carry a body; every other method yields
/// [`Body::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body was read.
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields, in wire order.
    Form(Params),
    /// `application/json` document.
    Json(Value),
}

impl Body {
    /// Returns `true` if no body was read.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the form fields, if this is a form body.
    pub fn form(&self) -> Option<&Params> {
        match self {
            Self::Form(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the JSON document, if this is a JSON body.
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// A request as read off the wire.
///
/// Created fresh for every connection and dropped with it. Header names are
/// stored lower-cased.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    params: Params,
    headers: Params,
    body: Body,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Creates a request with no parameters, headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Params::new(),
            headers: Params::new(),
            body: Body::Empty,
            remote_addr: None,
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decoded query parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Looks up a single query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Request headers keyed by lower-cased name.
    pub fn headers(&self) -> &Params {
        &self.headers
    }

    /// Looks up a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The decoded body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Looks up a form field of a form-encoded body.
    pub fn post_data(&self, name: &str) -> Option<&str> {
        self.body
            .form()
            .and_then(|fields| fields.get(name))
            .map(String::as_str)
    }

    /// Address of the peer, when known.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Replaces the query parameters.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Stores a header under its lower-cased name.
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Records the peer address.
    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}
