//! Extension to content-type table.

use std::path::Path;

/// Content type used when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Returns the content type for a file path, based on its extension.
///
/// The lookup is case-insensitive. Unknown or missing extensions map to
/// [`DEFAULT_CONTENT_TYPE`].
///
/// # Example
///
/// ```
/// use routerhttp_core::content_type_for;
///
/// assert_eq!(content_type_for("index.HTML"), "text/html");
/// assert_eq!(content_type_for("blob.bin"), "application/octet-stream");
/// ```
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        // Text
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",

        // Images
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("svg") => "image/svg+xml",

        // Documents and archives
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",

        // Audio / video
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",

        _ => DEFAULT_CONTENT_TYPE,
    }
}
