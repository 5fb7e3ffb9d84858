//! Transport-neutral request and response shapes.
//!
//! The HTTP adapter never touches a concrete web framework. Framework shims
//! translate their native request into an [`HttpRequestContext`] and apply
//! the returned [`HttpResponseInstructions`] to their native response.

use serde_json::{Value, json};

/// A view of an incoming HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequestContext {
    method: String,
    path: String,
    url: String,
    // Names stored lowercase for case-insensitive lookup.
    headers: Vec<(String, String)>,
}

impl HttpRequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_lowercase(), value.into()));
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full URL of the request, used as the protected resource URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Browser heuristic: an HTML-accepting Mozilla user agent gets the
    /// paywall page instead of a bare JSON 402.
    pub fn prefers_html(&self) -> bool {
        let accepts_html = self
            .accept()
            .is_some_and(|accept| accept.contains("text/html"));
        let is_browser = self
            .user_agent()
            .is_some_and(|ua| ua.starts_with("Mozilla"));
        accepts_html && is_browser
    }

    /// Opaque transport context handed to extension declaration enrichers.
    pub fn transport_context(&self) -> Value {
        json!({
            "method": self.method,
            "path": self.path,
            "url": self.url,
            "accept": self.accept(),
            "userAgent": self.user_agent(),
        })
    }
}

/// What the transport should send back: a status, headers to set, and an
/// optional body. For settlement results the status is advisory — the
/// protected handler's own status stands, and only the headers are merged.
#[derive(Debug, Clone)]
pub struct HttpResponseInstructions {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpResponseInstructions {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<String>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = HttpRequestContext::new("get", "/a", "https://x.test/a")
            .with_header("X-Payment", "abc");
        assert_eq!(ctx.header("x-payment"), Some("abc"));
        assert_eq!(ctx.header("X-PAYMENT"), Some("abc"));
        assert_eq!(ctx.method(), "GET");
    }

    #[test]
    fn test_prefers_html_requires_browser_ua_and_accept() {
        let browser = HttpRequestContext::new("GET", "/a", "https://x.test/a")
            .with_header("Accept", "text/html,application/xhtml+xml")
            .with_header("User-Agent", "Mozilla/5.0");
        assert!(browser.prefers_html());

        let api_client = HttpRequestContext::new("GET", "/a", "https://x.test/a")
            .with_header("Accept", "application/json")
            .with_header("User-Agent", "Mozilla/5.0");
        assert!(!api_client.prefers_html());

        let curl = HttpRequestContext::new("GET", "/a", "https://x.test/a")
            .with_header("Accept", "text/html")
            .with_header("User-Agent", "curl/8.0");
        assert!(!curl.prefers_html());
    }
}
