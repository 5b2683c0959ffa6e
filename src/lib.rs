//! # ldp-gateway
//!
//! A Linked Data Platform gateway in front of pluggable RDF storage.
//!
//! The gateway answers one question per request:
//!
//! > Which representation of which resource may this caller see?
//!
//! ## Pipeline
//!
//! ```text
//! RequestContext → negotiate → classify_network ─┐
//!                            → extract_identity ─┴→ AccessDecision
//!                → resolve_resource / resolve_service
//!                → Dispatcher → LinkedDataStorage → LdpResponse
//! ```
//!
//! ## Guarantees
//!
//! - Every request ends in exactly one [`LdpResponse`]; backend failures
//!   become `503` without leaking their cause
//! - Only `public` resources are readable without a validated token, except
//!   `internal` ones from the library network
//! - A bare resource URI never touches storage; it redirects to `/about`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod negotiate;
pub mod resolve;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use access::{classify_network, parse_forwarded_for, IpRange, IpRangeSet, NetworkPolicy};
pub use auth::{AuthError, Authorization, StaticTokenAuthorization};
pub use config::{ConfigError, GatewayConfig, SeedDocument};
pub use dispatch::{Dispatcher, HealthReport, InitError};
pub use error::GatewayError;
pub use identity::{extract_identity, Credential, SessionCookie};
pub use negotiate::{negotiate, NegotiatedRepresentation};
pub use resolve::{resolve_resource, resolve_service};
pub use store::{InMemoryStorage, LinkedDataStorage, StorageError};
pub use types::{
    AccessDecision, AccessRights, Format, Identity, LdpResponse, NetworkOrigin, NetworkTier,
    QueryParams, RequestContext, ResourceAddress, SearchQuery, ServiceRoute, Variant,
};

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};
