//! Gateway error taxonomy with HTTP status mapping.

use http::StatusCode;
use thiserror::Error;

use crate::store::StorageError;

/// Message shown to callers when a backend fails.
pub const BACKEND_UNAVAILABLE_MESSAGE: &str = "Failed to connect to backend! Please try again later!";

/// Every way a request can end other than a served representation.
///
/// The dispatcher turns each variant into a response via
/// [`status_code`](Self::status_code) and
/// [`public_message`](Self::public_message); nothing propagates further.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Target graph is not on the allow-list.
    #[error("graph is not valid: {0}")]
    InvalidGraph(String),

    /// Requested format is unknown or not allowed on this route.
    #[error("No valid {{format}} requested: {0}")]
    InvalidFormat(String),

    /// A required query parameter is absent or empty.
    #[error("Parameter '{0}' not defined!")]
    MissingParameter(&'static str),

    /// `POST /sparql` with a content type other than SPARQL query/update.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Unknown service sub-route.
    #[error("You requested a not implemented service: {0}")]
    NotImplemented(String),

    /// The session cookie could not be decoded.
    #[error("malformed session cookie: {0}")]
    MalformedSession(String),

    /// Nothing stored under the requested URI or query.
    #[error("{0}")]
    NotFound(String),

    /// Access rights deny the caller; carries the configured message.
    #[error("{0}")]
    Forbidden(String),

    /// Update or query body was empty.
    #[error("No Content")]
    NoContent,

    /// The request body exceeds the accepted size (limit in bytes).
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// The request body could not be read.
    #[error("request body could not be read: {0}")]
    UnreadableBody(String),

    /// The backend answered a SPARQL update with something other than `201`.
    #[error("SPARQL update rejected with status {0}")]
    UpdateRejected(String),

    /// No storage backend is registered.
    #[error("no storage backend configured")]
    StorageUnavailable,

    /// The storage backend failed.
    #[error("storage backend failed: {0}")]
    Storage(#[from] StorageError),
}

impl GatewayError {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 - client errors
            GatewayError::InvalidGraph(_)
            | GatewayError::InvalidFormat(_)
            | GatewayError::MissingParameter(_)
            | GatewayError::UnsupportedContentType(_)
            | GatewayError::NotImplemented(_)
            | GatewayError::MalformedSession(_)
            | GatewayError::UnreadableBody(_)
            | GatewayError::UpdateRejected(_) => StatusCode::BAD_REQUEST,

            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,

            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NoContent => StatusCode::NO_CONTENT,

            // 503 - backend trouble, never a stack trace
            GatewayError::StorageUnavailable | GatewayError::Storage(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Text safe to send to the caller.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::InvalidGraph(_) => "Bad request - graph is not valid!".to_string(),
            GatewayError::MissingParameter(name) => {
                format!("Bad request. Parameter '{}' not defined!", name)
            }
            GatewayError::UnsupportedContentType(_) => {
                "Content-type has to be 'application/sparql-update'!".to_string()
            }
            GatewayError::NotImplemented(_) => "You requested a not implemented service!".to_string(),
            GatewayError::MalformedSession(_) => "Bad request - session cookie is malformed!".to_string(),
            GatewayError::UpdateRejected(_) => "something went wrong!".to_string(),
            GatewayError::PayloadTooLarge(_) => "Request body too large!".to_string(),
            GatewayError::UnreadableBody(_) => "Bad request - body could not be read!".to_string(),
            GatewayError::NoContent => String::new(),
            GatewayError::StorageUnavailable | GatewayError::Storage(_) => {
                BACKEND_UNAVAILABLE_MESSAGE.to_string()
            }
            GatewayError::InvalidFormat(_) | GatewayError::NotFound(_) | GatewayError::Forbidden(_) => {
                self.to_string()
            }
        }
    }

    /// Whether this error reflects a server-side failure worth an error log.
    pub fn is_server_fault(&self) -> bool {
        self.status_code().is_server_error()
    }
}
