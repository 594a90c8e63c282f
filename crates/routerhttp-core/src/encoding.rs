//! Percent-decoding and `key=value` pair parsing.
//!
//! Query strings and `application/x-www-form-urlencoded` bodies share the same
//! grammar: pairs separated by `&`, key and value separated by `=`, both
//! percent-encoded. The two parsers differ only in how they treat a pair that
//! is not exactly `key=value`: the query parser drops it, the form parser
//! rejects the whole body.

use indexmap::IndexMap;

use crate::error::{RouterError, RouterResult};

/// Ordered string map used for parameters, form fields and headers.
pub type Params = IndexMap<String, String>;

/// Decodes `%XX` escapes in `encoded`.
///
/// Exactly two hex digits must follow every `%`. A truncated or non-hex
/// escape is a protocol error. `+` is left untouched. Decoded bytes that are
/// not valid UTF-8 are replaced with U+FFFD.
///
/// # Example
///
/// ```
/// use routerhttp_core::url_decode;
///
/// assert_eq!(url_decode("a%20b").unwrap(), "a b");
/// assert!(url_decode("%4").is_err());
/// ```
pub fn url_decode(encoded: &str) -> RouterResult<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| RouterError::malformed(format!("truncated escape in '{encoded}'")))?;
            let high = hex_value(hex[0]);
            let low = hex_value(hex[1]);
            match (high, low) {
                (Some(h), Some(l)) => out.push((h << 4) | l),
                _ => {
                    return Err(RouterError::malformed(format!(
                        "invalid escape in '{encoded}'"
                    )))
                }
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parses a query string into an ordered map.
///
/// Pairs without exactly one `=` are dropped. Later duplicates overwrite
/// earlier ones.
pub fn parse_query(query: &str) -> RouterResult<Params> {
    let mut params = Params::new();
    for pair in query.split('&') {
        let parts: Vec<&str> = pair.split('=').collect();
        if let [key, value] = parts.as_slice() {
            params.insert(url_decode(key)?, url_decode(value)?);
        }
    }
    Ok(params)
}

/// Parses an `application/x-www-form-urlencoded` body.
///
/// Unlike [`parse_query`], any pair that is not exactly `key=value` makes the
/// body undecodable.
pub fn parse_form(body: &str) -> RouterResult<Params> {
    let mut fields = Params::new();
    for pair in body.split('&') {
        let parts: Vec<&str> = pair.split('=').collect();
        match parts.as_slice() {
            [key, value] => {
                fields.insert(url_decode(key)?, url_decode(value)?);
            }
            _ => {
                return Err(RouterError::unsupported_media_type(
                    "application/x-www-form-urlencoded",
                ))
            }
        }
    }
    Ok(fields)
}
