//! Per-request context.

use http::header::{COOKIE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::access::parse_forwarded_for;

/// Header carrying the proxy chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Ordered, multi-valued query parameters, already percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse a raw `application/x-www-form-urlencoded` query string.
    pub fn parse(raw: &str) -> Self {
        Self(
            url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name`, if it is not empty.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// Every value for `name`, in request order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether no parameters were given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the dispatcher knows about one inbound request.
///
/// Built once at the transport boundary; the pipeline only reads it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    servlet_path: String,
    path_info: String,
    query: QueryParams,
    headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    forwarded_for: Vec<IpAddr>,
    body: String,
}

impl RequestContext {
    /// Create a context for `method` on `servlet_path` + `path_info`.
    pub fn new(method: Method, servlet_path: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self {
            method,
            servlet_path: servlet_path.into(),
            path_info: path_info.into(),
            query: QueryParams::default(),
            headers: HeaderMap::new(),
            cookies: BTreeMap::new(),
            forwarded_for: Vec::new(),
            body: String::new(),
        }
    }

    /// Shorthand for a `GET` context.
    pub fn get(servlet_path: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self::new(Method::GET, servlet_path, path_info)
    }

    /// Shorthand for a `POST` context.
    pub fn post(servlet_path: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self::new(Method::POST, servlet_path, path_info)
    }

    /// Attach a raw query string.
    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = QueryParams::parse(raw);
        self
    }

    /// Attach the full header map, deriving cookies and the forwarded-for chain.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self.refresh_derived();
        self
    }

    /// Append one header. Values that are not valid header text are dropped.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(HeaderName::from_static(name), value);
            self.refresh_derived();
        }
        self
    }

    /// Attach the request body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn refresh_derived(&mut self) {
        self.cookies = parse_cookies(&self.headers);
        self.forwarded_for = self
            .headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_forwarded_for)
            .collect();
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Mount path of the endpoint, e.g. `/resource`.
    pub fn servlet_path(&self) -> &str {
        &self.servlet_path
    }

    /// Remainder of the path below the mount, e.g. `/x/about`.
    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    /// Query parameters.
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header as text.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Cookies by name, raw (not percent-decoded). The first occurrence wins.
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Parsed `X-Forwarded-For` chain, client first.
    pub fn forwarded_for(&self) -> &[IpAddr] {
        &self.forwarded_for
    }

    /// `Host` header (including port, when the client sent one).
    pub fn host(&self) -> Option<&str> {
        self.header(HOST)
    }

    /// Request body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok()) {
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_multi_value() {
        let q = QueryParams::parse("q=title%3Arust&fq=a&fq=b+c&rows=");
        assert_eq!(q.get("q"), Some("title:rust"));
        assert_eq!(q.get_all("fq").collect::<Vec<_>>(), vec!["a", "b c"]);
        assert_eq!(q.get("rows"), Some(""));
        assert_eq!(q.get_non_empty("rows"), None);
        assert_eq!(q.get("missing"), None);
    }

    #[test]
    fn test_cookie_parsing_first_wins() {
        let ctx = RequestContext::get("/resource", "/x")
            .with_header("cookie", "a=1; PaiaService=%7B%7D")
            .with_header("cookie", "a=2");
        assert_eq!(ctx.cookies().get("a").map(String::as_str), Some("1"));
        assert_eq!(ctx.cookies().get("PaiaService").map(String::as_str), Some("%7B%7D"));
    }

    #[test]
    fn test_forwarded_for_chain() {
        let ctx = RequestContext::get("/resource", "/x")
            .with_header("x-forwarded-for", "10.1.2.3, garbage, 192.168.0.1");
        assert_eq!(
            ctx.forwarded_for(),
            &["10.1.2.3".parse::<IpAddr>().unwrap(), "192.168.0.1".parse().unwrap()]
        );
    }

    #[test]
    fn test_host() {
        let ctx = RequestContext::get("/resource", "/x").with_header("host", "localhost:8080");
        assert_eq!(ctx.host(), Some("localhost:8080"));
    }
}
