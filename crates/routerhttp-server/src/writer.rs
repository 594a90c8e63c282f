//! Response serialization.
//!
//! Every response is written as `HTTP/1.1` and the connection is closed
//! afterwards; there is no keep-alive.

use std::fmt::Write as _;

use http::StatusCode;
use routerhttp_core::{HttpContext, Response};
use routerhttp_telemetry::metrics;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const CONTENT_TYPE: &str = "Content-Type";

/// Serializes the status line and header block of a response.
///
/// The content type always appears exactly once: it takes the place of a
/// header with the same name (compared case-insensitively) or is appended
/// after the other headers.
pub fn response_head(response: &Response, status: StatusCode) -> String {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    let mut content_type_written = false;
    for (name, value) in response.headers() {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            if !content_type_written {
                let _ = write!(head, "{CONTENT_TYPE}: {}\r\n", response.content_type());
                content_type_written = true;
            }
            continue;
        }
        let _ = write!(head, "{name}: {value}\r\n");
    }
    if !content_type_written {
        let _ = write!(head, "{CONTENT_TYPE}: {}\r\n", response.content_type());
    }

    head.push_str("\r\n");
    head
}

/// Writes the response in `ctx` and closes the write side of `writer`.
///
/// Write failures are logged, not returned: the client is gone either way.
pub async fn send_response<W>(writer: &mut W, ctx: &HttpContext, status: StatusCode)
where
    W: AsyncWrite + Unpin,
{
    let request = ctx.request();
    let response = ctx.response();
    let head = response_head(response, status);

    let written = async {
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(response.body()).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        warn!(
            method = %request.method(),
            url = request.url(),
            status = status.as_u16(),
            content_type = response.content_type(),
            error = %e,
            "failed to write response"
        );
    }

    if let Err(e) = writer.shutdown().await {
        debug!(error = %e, "shutdown after response failed");
    }

    info!(
        method = %request.method(),
        status = status.as_u16(),
        url = request.url(),
        content_type = response.content_type(),
        "request served"
    );
    metrics::record_http_request(request.method().as_str(), status.as_u16());
}
