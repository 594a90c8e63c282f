//! Per-request handler context.
//!
//! A [`HttpContext`] pairs the parsed [`Request`] with the [`Response`] being
//! built. Route handlers and status handlers receive it mutably, in that
//! order, on the connection task.

use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::Response;
use crate::template::{RenderError, SubstitutionRenderer, TemplateRenderer};

/// Request/response pair handed to handlers.
pub struct HttpContext {
    request: Request,
    response: Response,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for HttpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl HttpContext {
    /// Wraps a request with an empty response and the substitution renderer.
    pub fn new(request: Request) -> Self {
        Self::with_renderer(request, Arc::new(SubstitutionRenderer))
    }

    /// Wraps a request using a custom template engine.
    pub fn with_renderer(request: Request, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            request,
            response: Response::new(),
            renderer,
        }
    }

    /// The parsed request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access to the request.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// The response under construction.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Mutable access to the response.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Renders a template with the configured engine.
    pub fn render(&self, template: &str, context: &Value) -> Result<String, RenderError> {
        self.renderer.render(template, context)
    }

    /// Schedules `task` on the current runtime, detached from this request.
    ///
    /// The task keeps running after the response has been written.
    pub fn spawn_background<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task)
    }

    /// Splits the context back into its parts.
    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }
}

/// Conversion from a handler return value to a status code.
///
/// Returning nothing (`()` or `None`) means `204 No Content`.
pub trait IntoStatus {
    /// Performs the conversion.
    fn into_status(self) -> Result<StatusCode, HandlerError>;
}

impl IntoStatus for StatusCode {
    fn into_status(self) -> Result<StatusCode, HandlerError> {
        Ok(self)
    }
}

impl IntoStatus for () {
    fn into_status(self) -> Result<StatusCode, HandlerError> {
        Ok(StatusCode::NO_CONTENT)
    }
}

impl IntoStatus for Option<StatusCode> {
    fn into_status(self) -> Result<StatusCode, HandlerError> {
        Ok(self.unwrap_or(StatusCode::NO_CONTENT))
    }
}

impl IntoStatus for u16 {
    fn into_status(self) -> Result<StatusCode, HandlerError> {
        StatusCode::from_u16(self).map_err(HandlerError::new)
    }
}

impl<T, E> IntoStatus for Result<T, E>
where
    T: IntoStatus,
    E: Into<HandlerError>,
{
    fn into_status(self) -> Result<StatusCode, HandlerError> {
        match self {
            Ok(value) => value.into_status(),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    #[test]
    fn test_into_status_variants() {
        assert_eq!(StatusCode::OK.into_status().unwrap(), StatusCode::OK);
        assert_eq!(().into_status().unwrap(), StatusCode::NO_CONTENT);
        assert_eq!(None::<StatusCode>.into_status().unwrap(), StatusCode::NO_CONTENT);
        assert_eq!(
            Some(StatusCode::CREATED).into_status().unwrap(),
            StatusCode::CREATED
        );
        assert_eq!(404u16.into_status().unwrap(), StatusCode::NOT_FOUND);
        assert!(42u16.into_status().is_err());
    }

    #[test]
    fn test_into_status_result() {
        let ok: Result<StatusCode, HandlerError> = Ok(StatusCode::ACCEPTED);
        assert_eq!(ok.into_status().unwrap(), StatusCode::ACCEPTED);

        let err: Result<(), &str> = Err("db down");
        assert_eq!(err.into_status().unwrap_err().message(), "db down");
    }

    #[test]
    fn test_context_render() {
        let ctx = HttpContext::new(Request::new(Method::GET, "/"));
        let page = ctx.render("<p><?= msg ?></p>", &json!({"msg": "hi"})).unwrap();
        assert_eq!(page, "<p>hi</p>");
    }

    #[test]
    fn test_context_mutation() {
        let mut ctx = HttpContext::new(Request::new(Method::GET, "/x"));
        ctx.response_mut().set_body("hello");
        ctx.response_mut().set_content_type("text/plain");

        let (req, res) = ctx.into_parts();
        assert_eq!(req.url(), "/x");
        assert_eq!(res.body().as_ref(), b"hello");
        assert_eq!(res.content_type(), "text/plain");
    }

    #[tokio::test]
    async fn test_spawn_background() {
        let ctx = HttpContext::new(Request::default());
        let (tx, rx) = tokio::sync::oneshot::channel();
        ctx.spawn_background(async move {
            let _ = tx.send(7);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }
}
