//! HTTP/1.x request parser.
//!
//! Parsing happens in two steps so the caller still holds the request when
//! the body turns out to be unusable:
//!
//! 1. [`read_head`] consumes lines up to the blank line that ends the
//!    header block and returns the method, URL, query parameters and
//!    headers.
//! 2. [`read_body`] reads and decodes the body of `POST` requests.
//!
//! [`parse_request`] runs both.

use http::Method;
use routerhttp_core::{parse_form, parse_query, Body, Request, RouterError, RouterResult};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Reads a complete request: head, then body for `POST`.
///
/// # Errors
///
/// - [`RouterError::MalformedRequest`] if no request line was found or the
///   query string holds an invalid escape
/// - [`RouterError::LengthRequired`] for a `POST` without a positive,
///   numeric `Content-Length`, or whose body ends early
/// - [`RouterError::UnsupportedMediaType`] for a `POST` body that is not
///   form-encoded or JSON, or fails to decode as such
pub async fn parse_request<R>(reader: &mut R) -> RouterResult<Request>
where
    R: AsyncBufRead + Unpin,
{
    let mut request = read_head(reader).await?;
    read_body(reader, &mut request).await?;
    Ok(request)
}

/// Reads the request line and headers, up to and including the blank line.
///
/// Header lines must hold exactly one `": "` separator; other lines are
/// ignored. End of stream ends the header block.
pub async fn read_head<R>(reader: &mut R) -> RouterResult<Request>
where
    R: AsyncBufRead + Unpin,
{
    let mut request: Option<Request> = None;
    let mut header_seen = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        reader.read_until(b'\n', &mut buf).await?;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        if request.is_none() && !header_seen {
            if let Some((method, target)) = parse_request_line(line) {
                request = Some(request_from_target(method, target)?);
            }
        }

        let mut parts = line.split(": ");
        if let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
            header_seen = true;
            if let Some(request) = request.as_mut() {
                request.insert_header(name, value);
            }
        }
    }

    let request = request.ok_or_else(|| RouterError::malformed("no request line"))?;
    trace!(method = %request.method(), url = request.url(), "request head parsed");
    Ok(request)
}

/// Reads and decodes the body of a `POST` request. Other methods are left
/// untouched.
pub async fn read_body<R>(reader: &mut R, request: &mut Request) -> RouterResult<()>
where
    R: AsyncBufRead + Unpin,
{
    if request.method() != Method::POST {
        return Ok(());
    }

    let length = request
        .header("content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| RouterError::length_required("missing or invalid content-length"))?;

    let mut data = Vec::new();
    let read = reader
        .take(length)
        .read_to_end(&mut data)
        .await
        .map_err(|e| RouterError::length_required(e.to_string()))?;
    if read as u64 != length {
        return Err(RouterError::length_required(format!(
            "expected {length} body bytes, got {read}"
        )));
    }

    let content_type = request
        .header("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    let body = if content_type.contains(FORM_CONTENT_TYPE) {
        let fields = parse_form(&String::from_utf8_lossy(&data))
            .map_err(|_| RouterError::unsupported_media_type(content_type.clone()))?;
        Body::Form(fields)
    } else if content_type.contains(JSON_CONTENT_TYPE) {
        let value: Value = serde_json::from_slice(&data)
            .map_err(|_| RouterError::unsupported_media_type(content_type.clone()))?;
        Body::Json(value)
    } else {
        return Err(RouterError::unsupported_media_type(content_type));
    };

    request.set_body(body);
    Ok(())
}

/// Splits `<METHOD> <target> HTTP/...` into method and target.
fn parse_request_line(line: &str) -> Option<(Method, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;

    if !version.starts_with("HTTP") || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    Method::from_bytes(method.as_bytes())
        .ok()
        .map(|method| (method, target))
}

fn request_from_target(method: Method, target: &str) -> RouterResult<Request> {
    let (url, query) = match target.split_once('?') {
        Some((url, query)) => (url, Some(query)),
        None => (target, None),
    };

    let mut request = Request::new(method, url);
    // A second '?' makes the whole query unusable.
    if let Some(query) = query.filter(|q| !q.contains('?')) {
        request.set_params(parse_query(query)?);
    }
    Ok(request)
}
