//! Transport-neutral response value.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

/// The one response every dispatcher branch ends in.
#[derive(Debug, Clone)]
pub struct LdpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl LdpResponse {
    /// Empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// `200 OK` with a body of the given content type.
    pub fn ok(content_type: &str, body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, content_type)
            .with_body(body)
    }

    /// Plain-text response, used for errors and acknowledgements.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .with_body(body)
    }

    /// Set a header, replacing earlier values.
    ///
    /// Values that are not valid header text (e.g. a misconfigured CORS
    /// string) are dropped with a warning.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(_) => {
                tracing::warn!(header = %name, value = %value, "Dropping invalid header value");
            }
        }
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// All headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Split into parts for the transport layer.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, String) {
        (self.status, self.headers, self.body)
    }
}
