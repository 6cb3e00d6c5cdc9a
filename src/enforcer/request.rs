use super::error::ConfigError;
use http::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Request body as received.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Raw text; parsed according to the matched media type.
    Text(String),
    /// Already-parsed structured data.
    Json(Value),
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// An HTTP-shaped request descriptor.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub headers: HashMap<String, String>,
    /// Raw query string, without the leading `?`.
    pub query: String,
    pub body: Option<Body>,
}

impl Request {
    /// Build a request from a method and a request target. A `?query` suffix on
    /// the target becomes the query string.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Cookies from the `cookie` header, `a=b; c=d`.
    #[must_use]
    pub fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie")
            .map(|c| {
                c.split(';')
                    .filter_map(|pair| {
                        let mut parts = pair.trim().splitn(2, '=');
                        let name = parts.next()?.trim();
                        if name.is_empty() {
                            return None;
                        }
                        let value = parts.next().unwrap_or("").trim();
                        Some((name.to_string(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Options for [`Document::enforce_request`](crate::Document::enforce_request).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct EnforceOptions {
    /// Pass undeclared query parameters through untyped instead of rejecting them.
    pub allow_other_query_parameters: bool,
}

impl EnforceOptions {
    /// Read options from a JSON object such as `{"allowOtherQueryParameters": true}`.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        Self::deserialize(value).map_err(|e| ConfigError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_splits_query() {
        let req = Request::new(Method::GET, "/pets?limit=5");
        assert_eq!(req.path, "/pets");
        assert_eq!(req.query, "limit=5");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("X-Trace", "abc");
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.header("other"), None);
    }

    #[test]
    fn cookies_are_parsed() {
        let req = Request::new(Method::GET, "/").with_header("Cookie", "a=b; c=d=e; ;flag");
        let cookies = req.cookies();
        assert_eq!(cookies.get("a").map(String::as_str), Some("b"));
        assert_eq!(cookies.get("c").map(String::as_str), Some("d=e"));
        assert_eq!(cookies.get("flag").map(String::as_str), Some(""));
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn options_reject_unknown_keys() {
        let opts = EnforceOptions::from_value(&json!({"allowOtherQueryParameters": true})).unwrap();
        assert!(opts.allow_other_query_parameters);
        assert_eq!(EnforceOptions::from_value(&json!({})).unwrap(), EnforceOptions::default());
        let err = EnforceOptions::from_value(&json!({"strict": true})).unwrap_err();
        assert!(err.to_string().contains("strict"));
    }
}
