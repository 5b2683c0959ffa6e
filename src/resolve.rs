//! Path resolution.
//!
//! Resource paths map onto canonical URIs below the configured base:
//! `<base><servlet path><path info>`, with a trailing `about` or
//! `about-meta` segment selecting the representation. Service paths map
//! onto one of three sub-routes.

use crate::error::GatewayError;
use crate::types::{Format, QueryParams, ResourceAddress, SearchQuery, ServiceEndpoint, ServiceRoute, Variant};

const ABOUT: &str = "about";
const ABOUT_META: &str = "about-meta";

/// Resolve a resource path.
///
/// Only the last segment is inspected, so `/x/about/about` addresses the
/// description of `/x/about`.
pub fn resolve_resource(
    graph: &str,
    path_info: &str,
    servlet_path: &str,
    base_url: &str,
) -> Result<ResourceAddress, GatewayError> {
    let (parent, last) = match path_info.rfind('/') {
        Some(idx) => (&path_info[..idx], &path_info[idx + 1..]),
        None => ("", path_info),
    };

    let (variant, format_override, resource_path) = match split_variant(last)? {
        Some((variant, format)) => (variant, format, parent),
        None => (Variant::Plain, None, path_info.trim_end_matches('/')),
    };

    let address = ResourceAddress {
        graph: graph.to_string(),
        canonical_uri: format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            servlet_path.trim_end_matches('/'),
            resource_path
        ),
        variant,
        format_override,
    };
    tracing::debug!(
        uri = %address.canonical_uri,
        variant = %address.variant,
        format_override = ?address.format_override,
        "Resolved resource path"
    );
    Ok(address)
}

/// `about[.ext]` / `about-meta[.ext]` → variant and forced format.
fn split_variant(segment: &str) -> Result<Option<(Variant, Option<Format>)>, GatewayError> {
    let (stem, ext) = match segment.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (segment, None),
    };
    let variant = match stem {
        ABOUT => Variant::About,
        ABOUT_META => Variant::AboutMeta,
        _ => return Ok(None),
    };
    let format = ext
        .map(|ext| Format::from_token(ext).ok_or_else(|| GatewayError::InvalidFormat(ext.to_string())))
        .transpose()?;
    Ok(Some((variant, format)))
}

/// Classify a service sub-route by its first path segment.
pub fn service_endpoint(path_info: &str) -> Result<ServiceEndpoint, GatewayError> {
    let name = path_info.trim_matches('/');
    match name {
        "resource" => Ok(ServiceEndpoint::Resource),
        "search" => Ok(ServiceEndpoint::Search),
        "sparql" => Ok(ServiceEndpoint::Sparql),
        other => Err(GatewayError::NotImplemented(other.to_string())),
    }
}

/// Classify a service sub-route and extract its required parameters.
pub fn resolve_service(path_info: &str, query: &QueryParams) -> Result<ServiceRoute, GatewayError> {
    match service_endpoint(path_info)? {
        ServiceEndpoint::Resource => {
            let uri = query
                .get_non_empty("uri")
                .ok_or(GatewayError::MissingParameter("uri"))?;
            Ok(ServiceRoute::Resource { uri: uri.to_string() })
        }
        ServiceEndpoint::Search => Ok(ServiceRoute::Search(search_query(query)?)),
        ServiceEndpoint::Sparql => {
            let q = query
                .get_non_empty("q")
                .ok_or(GatewayError::MissingParameter("q"))?;
            Ok(ServiceRoute::Sparql { query: q.to_string() })
        }
    }
}

fn search_query(query: &QueryParams) -> Result<SearchQuery, GatewayError> {
    let q = query
        .get_non_empty("q")
        .ok_or(GatewayError::MissingParameter("q"))?;
    let owned = |name: &str| query.get_non_empty(name).map(str::to_string);
    let filters: Vec<&str> = query.get_all("fq").filter(|v| !v.is_empty()).collect();

    Ok(SearchQuery {
        q: q.to_string(),
        start: owned("start"),
        rows: owned("rows"),
        sort: owned("sort"),
        fq: (!filters.is_empty()).then(|| filters.join(";")),
    })
}
