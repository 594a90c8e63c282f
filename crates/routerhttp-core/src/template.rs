//! Template rendering seam.
//!
//! Rendering engines are pluggable through [`TemplateRenderer`]. The bundled
//! [`SubstitutionRenderer`] only understands named substitution directives of
//! the form `<?= name ?>` or `<?= user.address.city ?>`; it never evaluates
//! expressions, so template content from untrusted sources cannot run code.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A `<?=` directive was never closed with `?>`.
    #[error("unterminated directive at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening `<?=`.
        offset: usize,
    },

    /// A directive contained something other than a dotted name.
    #[error("invalid directive '{directive}'")]
    InvalidDirective {
        /// Directive text between the delimiters.
        directive: String,
    },

    /// A name was not present in the context.
    #[error("unknown name '{name}'")]
    UnknownName {
        /// The dotted name that failed to resolve.
        name: String,
    },
}

/// A template engine.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` against `context`.
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError>;
}

const OPEN: &str = "<?=";
const CLOSE: &str = "?>";

/// Renderer replacing `<?= name ?>` directives with context values.
///
/// Strings are inserted verbatim, `null` renders as nothing, other values
/// render as compact JSON.
///
/// # Example
///
/// ```
/// use routerhttp_core::{SubstitutionRenderer, TemplateRenderer};
/// use serde_json::json;
///
/// let out = SubstitutionRenderer
///     .render("Hi <?= user.name ?>!", &json!({"user": {"name": "Ada"}}))
///     .unwrap();
/// assert_eq!(out, "Hi Ada!");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionRenderer;

impl TemplateRenderer for SubstitutionRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        let mut consumed = 0;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or(RenderError::Unterminated {
                offset: consumed + start,
            })?;

            let name = after_open[..end].trim();
            out.push_str(&lookup(context, name)?);

            let advance = start + OPEN.len() + end + CLOSE.len();
            consumed += advance;
            rest = &rest[advance..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Escapes text for use inside HTML element content or a quoted attribute.
///
/// ```
/// use routerhttp_core::html_escape;
///
/// assert_eq!(
///     html_escape(r#"<a href="x">'&'</a>"#),
///     "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
/// );
/// ```
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn lookup(context: &Value, name: &str) -> Result<String, RenderError> {
    let valid = !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !valid {
        return Err(RenderError::InvalidDirective {
            directive: name.to_string(),
        });
    }

    let mut current = context;
    for segment in name.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| RenderError::UnknownName {
            name: name.to_string(),
        })?;
    }

    Ok(match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("plain text"), "plain text");
        assert_eq!(
            html_escape("/<script>alert(1)</script>"),
            "/&lt;script&gt;alert(1)&lt;/script&gt;"
        );
        assert_eq!(html_escape("a&amp;b"), "a&amp;amp;b");
    }

    #[test]
    fn test_no_directives() {
        let out = SubstitutionRenderer.render("plain <b>text</b>", &json!({})).unwrap();
        assert_eq!(out, "plain <b>text</b>");
    }

    #[test]
    fn test_substitutes_values() {
        let ctx = json!({"title": "Home", "count": 3, "flags": [true, false], "none": null});
        let out = SubstitutionRenderer
            .render(
                "<h1><?= title ?></h1><?=count?>/<?= flags.1 ?>/[<?= none ?>]",
                &ctx,
            )
            .unwrap();
        assert_eq!(out, "<h1>Home</h1>3/false/[]");
    }

    #[test]
    fn test_nested_object_renders_as_json() {
        let ctx = json!({"user": {"id": 7}});
        let out = SubstitutionRenderer.render("<?= user ?>", &ctx).unwrap();
        assert_eq!(out, r#"{"id":7}"#);
    }

    #[test]
    fn test_unknown_name() {
        let err = SubstitutionRenderer
            .render("<?= missing.key ?>", &json!({"missing": {}}))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownName {
                name: "missing.key".into()
            }
        );
    }

    #[test]
    fn test_rejects_expressions() {
        let err = SubstitutionRenderer
            .render("<?= __import__('os') ?>", &json!({}))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidDirective { .. }));
    }

    #[test]
    fn test_unterminated() {
        let err = SubstitutionRenderer
            .render("ok <?= name", &json!({"name": "x"}))
            .unwrap_err();
        assert_eq!(err, RenderError::Unterminated { offset: 3 });
    }
}
