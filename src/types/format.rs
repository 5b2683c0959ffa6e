//! Response representations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Representation a response body is produced in.
///
/// Every MIME and wire-token decision goes through this table; route handlers
/// only pick which subset of formats they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Format {
    /// HTML page.
    Html,
    /// RDF/XML.
    RdfXml,
    /// Turtle.
    Turtle,
    /// JSON-LD (wire token `json`).
    JsonLd,
    /// N-Quads.
    NQuads,
    /// XHTML with embedded RDFa.
    Rdfa,
    /// Plain XML result sets (search and SPARQL results).
    Xml,
}

/// Formats a bare resource URI may be redirected for.
pub const PLAIN_FORMATS: &[Format] = &[
    Format::Html,
    Format::Rdfa,
    Format::RdfXml,
    Format::Turtle,
    Format::JsonLd,
    Format::NQuads,
];

/// Formats an `about` / `about-meta` description can be served in.
pub const DESCRIPTION_FORMATS: &[Format] = &[
    Format::Html,
    Format::RdfXml,
    Format::Turtle,
    Format::JsonLd,
    Format::NQuads,
];

/// Formats accepted by the search and SPARQL routes.
pub const QUERY_FORMATS: &[Format] = &[Format::Html, Format::Xml, Format::JsonLd];

impl Format {
    /// All formats, in declaration order.
    pub const ALL: [Format; 7] = [
        Format::Html,
        Format::RdfXml,
        Format::Turtle,
        Format::JsonLd,
        Format::NQuads,
        Format::Rdfa,
        Format::Xml,
    ];

    /// Parse a format token as used in `format=` parameters and
    /// `about.<ext>` suffixes.
    pub fn from_token(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Some(Self::Html),
            "rdf.xml" | "rdf" => Some(Self::RdfXml),
            "rdf.ttl" | "ttl" | "turtle" => Some(Self::Turtle),
            "json" | "jsonld" | "json-ld" => Some(Self::JsonLd),
            "nquads" | "nq" => Some(Self::NQuads),
            "rdfa" => Some(Self::Rdfa),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Canonical wire token, passed verbatim to the storage backend.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::RdfXml => "rdf.xml",
            Self::Turtle => "rdf.ttl",
            Self::JsonLd => "json",
            Self::NQuads => "nquads",
            Self::Rdfa => "rdfa",
            Self::Xml => "xml",
        }
    }

    /// MIME type of a resource document in this format.
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::RdfXml => "application/rdf+xml",
            Self::Turtle => "text/turtle",
            Self::JsonLd => "application/ld+json",
            Self::NQuads => "application/n-quads",
            Self::Rdfa => "application/xhtml+xml",
            Self::Xml => "application/xml",
        }
    }

    /// MIME type of a SPARQL result set in this format.
    pub const fn result_mime_type(self) -> &'static str {
        match self {
            Self::JsonLd => "application/json",
            other => other.mime_type(),
        }
    }

    /// `Content-Type` value for a resource document.
    pub fn content_type(self) -> String {
        format!("{};charset=UTF-8", self.mime_type())
    }

    /// `Content-Type` value for a SPARQL result set.
    pub fn result_content_type(self) -> String {
        format!("{};charset=UTF-8", self.result_mime_type())
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::Html
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trips_through_parser() {
        for format in Format::ALL {
            assert_eq!(Format::from_token(format.token()), Some(format));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Format::from_token("ttl"), Some(Format::Turtle));
        assert_eq!(Format::from_token("JSON-LD"), Some(Format::JsonLd));
        assert_eq!(Format::from_token("nq"), Some(Format::NQuads));
        assert_eq!(Format::from_token("pdf"), None);
        assert_eq!(Format::from_token(""), None);
    }

    #[test]
    fn test_json_mime_types_differ_by_route() {
        assert_eq!(Format::JsonLd.content_type(), "application/ld+json;charset=UTF-8");
        assert_eq!(Format::JsonLd.result_content_type(), "application/json;charset=UTF-8");
        assert_eq!(Format::Xml.result_content_type(), "application/xml;charset=UTF-8");
    }

    #[test]
    fn test_route_format_sets() {
        assert!(PLAIN_FORMATS.contains(&Format::Rdfa));
        assert!(!DESCRIPTION_FORMATS.contains(&Format::Rdfa));
        assert!(!DESCRIPTION_FORMATS.contains(&Format::Xml));
        assert!(QUERY_FORMATS.contains(&Format::Xml));
        assert!(!QUERY_FORMATS.contains(&Format::Turtle));
    }
}
