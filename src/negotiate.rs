//! Format and language negotiation.
//!
//! `Accept` is matched by substring against a fixed precedence table; there
//! is no q-value weighting. A `format` query parameter always wins over the
//! header.

use http::header::{ACCEPT, ACCEPT_LANGUAGE};
use http::HeaderMap;

use crate::error::GatewayError;
use crate::types::{Format, QueryParams};

/// `Accept` substrings in match precedence. First hit wins.
const ACCEPT_TABLE: &[(&str, Format)] = &[
    ("text/html", Format::Html),
    ("application/rdf+xml", Format::RdfXml),
    ("application/xhtml+xml", Format::Rdfa),
    ("text/turtle", Format::Turtle),
    ("application/x-turtle", Format::Turtle),
    ("application/turtle", Format::Turtle),
    ("application/ld+json", Format::JsonLd),
    ("application/json", Format::JsonLd),
    ("application/n-quads", Format::NQuads),
];

/// Languages recognized in `Accept-Language`.
const LANGUAGES: &[&str] = &["de", "en"];

/// Outcome of negotiation: the format and language to answer in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedRepresentation {
    format: Format,
    language: String,
    rejected_override: Option<String>,
}

impl NegotiatedRepresentation {
    /// Build a representation directly.
    pub fn new(format: Format, language: impl Into<String>) -> Self {
        Self {
            format,
            language: language.into(),
            rejected_override: None,
        }
    }

    /// Negotiated format (ignores a rejected override).
    pub fn format(&self) -> Format {
        self.format
    }

    /// Negotiated language tag.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The raw `format` parameter, when it named no known format.
    pub fn rejected_override(&self) -> Option<&str> {
        self.rejected_override.as_deref()
    }

    /// Force `format`, e.g. from an `about.<ext>` suffix.
    pub fn with_override(mut self, format: Format) -> Self {
        self.format = format;
        self.rejected_override = None;
        self
    }

    /// The format, if the route accepts it.
    pub fn checked_format(&self, allowed: &[Format]) -> Result<Format, GatewayError> {
        if let Some(raw) = &self.rejected_override {
            return Err(GatewayError::InvalidFormat(raw.clone()));
        }
        if allowed.contains(&self.format) {
            Ok(self.format)
        } else {
            Err(GatewayError::InvalidFormat(self.format.token().to_string()))
        }
    }
}

/// First format whose MIME substring appears in the `Accept` header.
pub fn format_from_accept(accept: &str) -> Option<Format> {
    let accept = accept.to_ascii_lowercase();
    ACCEPT_TABLE
        .iter()
        .find(|(needle, _)| accept.contains(needle))
        .map(|(_, format)| *format)
}

/// Language from `Accept-Language`, then `lang`, then `default`.
pub fn language_from(headers: &HeaderMap, query: &QueryParams, default: &str) -> String {
    let header = headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase());
    if let Some(header) = header {
        if let Some(lang) = LANGUAGES.iter().find(|l| header.starts_with(**l)) {
            return (*lang).to_string();
        }
    }
    query
        .get_non_empty("lang")
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// Negotiate the response representation. Never fails.
pub fn negotiate(headers: &HeaderMap, query: &QueryParams, default_language: &str) -> NegotiatedRepresentation {
    let mut format = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(format_from_accept)
        .unwrap_or_default();

    let mut rejected_override = None;
    if let Some(raw) = query.get_non_empty("format") {
        match Format::from_token(raw) {
            Some(f) => format = f,
            None => rejected_override = Some(raw.to_string()),
        }
    }

    let representation = NegotiatedRepresentation {
        format,
        language: language_from(headers, query, default_language),
        rejected_override,
    };
    tracing::debug!(
        format = %representation.format,
        language = %representation.language,
        rejected = ?representation.rejected_override,
        "Negotiated representation"
    );
    representation
}
