//! Core types for the gateway pipeline.

pub mod format;
pub mod access;
pub mod address;
pub mod request;
pub mod response;

pub use format::{Format, PLAIN_FORMATS, DESCRIPTION_FORMATS, QUERY_FORMATS};
pub use access::{AccessDecision, AccessRights, Identity, NetworkOrigin, NetworkTier};
pub use address::{ResourceAddress, SearchQuery, ServiceEndpoint, ServiceRoute, Variant};
pub use request::{QueryParams, RequestContext};
pub use response::LdpResponse;
