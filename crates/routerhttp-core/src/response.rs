//! Mutable response scratch object populated by handlers.

use std::path::Path;

use bytes::Bytes;
use http::StatusCode;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::HandlerError;
use crate::mime::content_type_for;

/// Content type of a fresh response.
pub const DEFAULT_RESPONSE_CONTENT_TYPE: &str = "text/html";

/// Response under construction.
///
/// One per request. The content type is kept apart from the other headers:
/// the writer always emits it as `Content-Type`, replacing any header of the
/// same name set through [`Response::insert_header`].
#[derive(Debug, Clone)]
pub struct Response {
    body: Bytes,
    content_type: String,
    headers: IndexMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty `text/html` response.
    pub fn new() -> Self {
        Self {
            body: Bytes::new(),
            content_type: DEFAULT_RESPONSE_CONTENT_TYPE.to_string(),
            headers: IndexMap::new(),
        }
    }

    /// The response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the response body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// The content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Replaces the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Extra headers, in insertion order.
    pub fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Sets a header, replacing a previous value under the exact same name.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Serializes `value` as the JSON body.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<(), HandlerError> {
        let body = serde_json::to_vec(value)?;
        self.body = Bytes::from(body);
        self.content_type = "application/json".to_string();
        Ok(())
    }

    /// Points the client at `url` and returns `302 Found`.
    pub fn redirect(&mut self, url: impl Into<String>) -> StatusCode {
        self.headers.insert("Location".to_string(), url.into());
        StatusCode::FOUND
    }

    /// Loads a file as a download.
    ///
    /// On success the body holds the file bytes, the content type follows
    /// the extension, a `Content-disposition` header names the file, and
    /// `200 OK` is returned. A missing path or a directory yields
    /// `404 Not Found` and leaves the response untouched.
    ///
    /// The file is read synchronously on the calling task, so it should be
    /// small.
    pub fn attachment(&mut self, path: impl AsRef<Path>) -> StatusCode {
        let path = path.as_ref();

        let contents = std::fs::metadata(path).and_then(|metadata| {
            if metadata.is_file() {
                std::fs::read(path)
            } else {
                Err(not_a_file())
            }
        });

        match contents {
            Ok(contents) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.body = Bytes::from(contents);
                self.content_type = content_type_for(path).to_string();
                self.headers.insert(
                    "Content-disposition".to_string(),
                    format!("attachment; filename=\"{filename}\""),
                );
                StatusCode::OK
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "attachment unavailable");
                StatusCode::NOT_FOUND
            }
        }
    }
}

/// Reads a file, refusing anything that is not a regular file.
pub async fn read_regular_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(not_a_file());
    }
    tokio::fs::read(path).await
}

fn not_a_file() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, "not a regular file")
}
