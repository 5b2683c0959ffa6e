//! Resolved resource addresses and service routes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::Format;

/// Which representation of a resource a path asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// The bare resource URI; answered with a redirect to its description.
    Plain,
    /// The resource description (`.../about`).
    About,
    /// Metadata about the description (`.../about-meta`).
    AboutMeta,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::About => write!(f, "about"),
            Self::AboutMeta => write!(f, "about-meta"),
        }
    }
}

/// A resource path resolved against the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAddress {
    /// Target graph.
    pub graph: String,
    /// Absolute URI of the resource, with any `about` suffix stripped.
    pub canonical_uri: String,
    /// Requested representation.
    pub variant: Variant,
    /// Format forced by an `about.<ext>` / `about-meta.<ext>` suffix.
    pub format_override: Option<Format>,
}

impl ResourceAddress {
    /// URI handed to the storage backend.
    ///
    /// `about-meta` describes the description document, so its subject is
    /// `<canonical>/about`.
    pub fn subject_uri(&self) -> String {
        match self.variant {
            Variant::AboutMeta => format!("{}/about", self.canonical_uri),
            Variant::Plain | Variant::About => self.canonical_uri.clone(),
        }
    }

    /// `Location` of the redirect answered for a plain resource.
    pub fn redirect_target(&self) -> String {
        format!("{}/about", self.canonical_uri)
    }

    /// `Link` header value pointing a description at its metadata.
    pub fn meta_link(&self) -> String {
        format!("<{}/about-meta>; rel=meta", self.canonical_uri)
    }
}

/// Backend search request built from query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query string.
    pub q: String,
    /// Offset of the first hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<String>,
    /// Sort expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// All `fq` filters joined with `;`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fq: Option<String>,
}

impl SearchQuery {
    /// A query with only `q` set.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Self::default()
        }
    }
}

/// Logical sub-route under the service context path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEndpoint {
    /// `/resource?uri=...`
    Resource,
    /// `/search?q=...`
    Search,
    /// `/sparql`
    Sparql,
}

/// A service request with its required parameters extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRoute {
    /// Fetch the resource named by `uri`.
    Resource {
        /// Absolute resource URI.
        uri: String,
    },
    /// Full-text search.
    Search(SearchQuery),
    /// SPARQL query from the `q` parameter.
    Sparql {
        /// Query text, passed through verbatim.
        query: String,
    },
}
