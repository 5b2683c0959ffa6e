//! LDP Gateway REST Service
//!
//! Exposes the dispatcher over HTTP.
//!
//! ## Endpoints
//!
//! - `GET <contextpath>/resource/*` - Resource redirect and descriptions
//! - `GET <contextpath>/ldp/resource?uri=` - Resource by absolute URI
//! - `GET <contextpath>/ldp/search?q=` - Full-text search
//! - `GET|POST <contextpath>/ldp/sparql` - SPARQL query and update
//! - `OPTIONS` on both endpoints - CORS preflight
//! - `GET /health` - Backend dependency status
//! - `GET /health/live` - Liveness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::request_logging_middleware;
pub use routes::create_router;
pub use state::ServiceState;
