//! Routes: a method set, an anchored pattern and a handler.

use std::fmt;
use std::sync::Arc;

use http::{Method, StatusCode};
use regex::Regex;
use routerhttp_core::{HandlerError, HttpContext, RouterError, RouterResult};

/// Route handler: receives the context and the captured groups.
pub type RouteHandler =
    Arc<dyn Fn(&mut HttpContext, &[String]) -> Result<StatusCode, HandlerError> + Send + Sync>;

/// Set of methods a route answers to.
///
/// # Example
///
/// ```rust
/// use routerhttp_router::MethodSet;
/// use http::Method;
///
/// let set = MethodSet::parse("get | Post").unwrap();
/// assert!(set.contains(&Method::GET));
/// assert!(set.contains(&Method::POST));
/// assert!(!set.contains(&Method::DELETE));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSet {
    methods: Vec<Method>,
}

impl MethodSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `|`-separated list such as `"GET|POST"`.
    ///
    /// Names are trimmed and upper-cased.
    pub fn parse(text: &str) -> RouterResult<Self> {
        let mut set = Self::new();
        for name in text.split('|') {
            let name = name.trim().to_ascii_uppercase();
            let method = Method::from_bytes(name.as_bytes()).map_err(|_| {
                RouterError::InvalidPattern {
                    pattern: text.to_string(),
                    reason: format!("invalid method '{name}'"),
                }
            })?;
            set = set.with(method);
        }
        Ok(set)
    }

    /// Adds a method.
    #[must_use]
    pub fn with(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    /// Adds `GET`.
    #[must_use]
    pub fn get(self) -> Self {
        self.with(Method::GET)
    }

    /// Adds `POST`.
    #[must_use]
    pub fn post(self) -> Self {
        self.with(Method::POST)
    }

    /// Returns `true` if the set includes `method`.
    pub fn contains(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Methods in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }
}

impl fmt::Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        write!(f, "{}", names.join("|"))
    }
}

impl From<Method> for MethodSet {
    fn from(method: Method) -> Self {
        Self::new().with(method)
    }
}

/// Anything that names a set of methods.
pub trait IntoMethodSet {
    /// Performs the conversion.
    fn into_method_set(self) -> RouterResult<MethodSet>;
}

impl IntoMethodSet for MethodSet {
    fn into_method_set(self) -> RouterResult<MethodSet> {
        Ok(self)
    }
}

impl IntoMethodSet for Method {
    fn into_method_set(self) -> RouterResult<MethodSet> {
        Ok(MethodSet::from(self))
    }
}

impl IntoMethodSet for &str {
    fn into_method_set(self) -> RouterResult<MethodSet> {
        MethodSet::parse(self)
    }
}

impl IntoMethodSet for String {
    fn into_method_set(self) -> RouterResult<MethodSet> {
        MethodSet::parse(&self)
    }
}

impl<const N: usize> IntoMethodSet for [Method; N] {
    fn into_method_set(self) -> RouterResult<MethodSet> {
        Ok(self.into_iter().fold(MethodSet::new(), MethodSet::with))
    }
}

fn present_groups(caps: &regex::Captures<'_>) -> Vec<String> {
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pattern: String,
    /// `None` when the pattern is not a valid regular expression; such a
    /// route only matches its own text.
    regex: Option<Regex>,
    methods: MethodSet,
    handler: RouteHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl Route {
    /// Compiles `pattern` anchored at both ends.
    ///
    /// A pattern that does not compile is kept as a literal-only route.
    pub fn new(methods: MethodSet, pattern: &str, handler: RouteHandler) -> Self {
        let regex = match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "pattern is not a valid regex, matching literally");
                None
            }
        };

        Self {
            pattern: pattern.to_string(),
            regex,
            methods,
            handler,
        }
    }

    /// Returns `false` for a literal-only route.
    pub fn is_regex(&self) -> bool {
        self.regex.is_some()
    }

    /// The pattern as registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The methods this route answers to.
    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    /// The handler.
    pub fn handler(&self) -> &RouteHandler {
        &self.handler
    }

    pub(crate) fn replace(&mut self, methods: MethodSet, handler: RouteHandler) {
        self.methods = methods;
        self.handler = handler;
    }

    /// Matches a URL, returning the captured groups.
    ///
    /// Groups that did not participate in the match are omitted. A URL equal
    /// to the pattern text matches even when the pattern is not a
    /// self-matching regular expression.
    pub fn captures(&self, url: &str) -> Option<Vec<String>> {
        if self.pattern == url {
            return Some(
                self.regex
                    .as_ref()
                    .and_then(|regex| regex.captures(url))
                    .map(|caps| present_groups(&caps))
                    .unwrap_or_default(),
            );
        }
        self.regex
            .as_ref()?
            .captures(url)
            .map(|caps| present_groups(&caps))
    }

    /// Matches a method and URL.
    pub fn matches(&self, method: &Method, url: &str) -> Option<Vec<String>> {
        if !self.methods.contains(method) {
            return None;
        }
        self.captures(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> RouteHandler {
        Arc::new(|_: &mut HttpContext, _: &[String]| Ok(StatusCode::OK))
    }

    #[test]
    fn test_method_set_parse() {
        let set = MethodSet::parse("GET|post").unwrap();
        assert_eq!(set.to_string(), "GET|POST");
        assert!(set.contains(&Method::POST));
    }

    #[test]
    fn test_method_set_dedup() {
        let set = MethodSet::parse("GET|GET").unwrap();
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn test_method_set_rejects_garbage() {
        assert!(MethodSet::parse("GE T").is_err());
        assert!(MethodSet::parse("").is_err());
    }

    #[test]
    fn test_into_method_set() {
        let set = [Method::GET, Method::PUT].into_method_set().unwrap();
        assert_eq!(set.to_string(), "GET|PUT");
        assert_eq!(
            Method::DELETE.into_method_set().unwrap(),
            MethodSet::new().with(Method::DELETE)
        );
    }

    #[test]
    fn test_literal_match() {
        let route = Route::new(MethodSet::new().get(), "/hello", noop());
        assert_eq!(route.captures("/hello"), Some(vec![]));
        assert_eq!(route.captures("/hello/x"), None);
        assert_eq!(route.captures("/hell"), None);
    }

    #[test]
    fn test_regex_is_anchored() {
        let route = Route::new(MethodSet::new().get(), r"/user/(\d+)", noop());
        assert_eq!(route.captures("/user/42"), Some(vec!["42".to_string()]));
        assert_eq!(route.captures("/user/42/edit"), None);
        assert_eq!(route.captures("/x/user/42"), None);
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let route = Route::new(MethodSet::new().get(), "/a|/b", noop());
        assert!(route.captures("/a").is_some());
        assert!(route.captures("/b").is_some());
        assert!(route.captures("/ab").is_none());
    }

    #[test]
    fn test_unmatched_groups_are_omitted() {
        let route = Route::new(MethodSet::new().get(), r"/f(/(\w+))?(x)?", noop());
        assert_eq!(
            route.captures("/f/name"),
            Some(vec!["/name".to_string(), "name".to_string()])
        );
        assert_eq!(route.captures("/f"), Some(vec![]));
    }

    #[test]
    fn test_literal_fast_path_for_non_self_matching_pattern() {
        let route = Route::new(MethodSet::new().get(), "/file.txt+", noop());
        assert!(route.captures("/file.txt+").is_some());
        assert!(route.captures("/fileatxttt").is_some());
    }

    #[test]
    fn test_method_filter() {
        let route = Route::new(MethodSet::new().post(), "/form", noop());
        assert!(route.matches(&Method::POST, "/form").is_some());
        assert!(route.matches(&Method::GET, "/form").is_none());
    }

    #[test]
    fn test_invalid_regex_matches_literally() {
        let route = Route::new(MethodSet::new().get(), "/a(b", noop());
        assert!(!route.is_regex());
        assert_eq!(route.captures("/a(b"), Some(vec![]));
        assert_eq!(route.captures("/ab"), None);
    }
}
