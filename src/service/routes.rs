//! Axum routes for the LDP gateway.

use axum::{
    body::to_bytes,
    extract::{Json, Request, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http_body_util::LengthLimitError;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::dispatch::HealthReport;
use crate::error::GatewayError;
use crate::types::{LdpResponse, RequestContext};

use super::state::ServiceState;

/// Upper bound on request bodies (SPARQL queries and updates).
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

impl IntoResponse for LdpResponse {
    fn into_response(self) -> Response {
        let (status, headers, body) = self.into_parts();
        (status, headers, body).into_response()
    }
}

// ============================================================================
// Request Conversion
// ============================================================================

/// Which endpoint a request arrived on.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Resource,
    Service,
}

/// Build the pipeline's view of an inbound request.
///
/// The path below the mount point becomes the path info, percent-decoded;
/// the servlet path is the endpoint's configured context path.
async fn request_context(state: &ServiceState, endpoint: Endpoint, request: Request) -> Result<RequestContext, LdpResponse> {
    let config = state.dispatcher.config();
    let (mount, servlet_path) = match endpoint {
        Endpoint::Resource => (config.resource_mount(), config.endpoints.resource_contextpath.clone()),
        Endpoint::Service => (config.service_mount(), config.endpoints.service_contextpath.clone()),
    };

    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    let path_info = path.strip_prefix(mount.as_str()).unwrap_or(path);
    let path_info = percent_decode_str(path_info).decode_utf8_lossy().into_owned();

    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        let err = e.into_inner();
        if exceeds_limit(&*err) {
            state.dispatcher.reject(GatewayError::PayloadTooLarge(MAX_BODY_BYTES))
        } else {
            state.dispatcher.reject(GatewayError::UnreadableBody(err.to_string()))
        }
    })?;

    Ok(RequestContext::new(parts.method, servlet_path, path_info)
        .with_query(parts.uri.query().unwrap_or_default())
        .with_headers(parts.headers)
        .with_body(String::from_utf8_lossy(&bytes).into_owned()))
}

fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Resource endpoint: `GET <resource mount>/...`.
async fn resource_handler(State(state): State<ServiceState>, request: Request) -> LdpResponse {
    match request_context(&state, Endpoint::Resource, request).await {
        Ok(ctx) => state.dispatcher.handle_resource(&ctx).await,
        Err(response) => response,
    }
}

/// Service endpoint: `GET|POST <service mount>/{resource,search,sparql}`.
async fn service_handler(State(state): State<ServiceState>, request: Request) -> LdpResponse {
    match request_context(&state, Endpoint::Service, request).await {
        Ok(ctx) => state.dispatcher.handle_service(&ctx).await,
        Err(response) => response,
    }
}

/// CORS preflight for both endpoints.
async fn preflight_handler(State(state): State<ServiceState>) -> LdpResponse {
    state.dispatcher.preflight()
}

/// Health check endpoint (detailed).
///
/// Reports the backends' own view of their dependencies.
async fn health_handler(State(state): State<ServiceState>) -> Json<HealthReport> {
    Json(state.dispatcher.health().await)
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the gateway.
///
/// Mount points come from the dispatcher's configuration.
pub fn create_router(state: ServiceState) -> Router {
    let config = state.dispatcher.config();
    let resource = config.resource_mount();
    let service = config.service_mount();
    let health = config.health_mount();

    Router::new()
        // Resource retrieval
        .route(&resource, get(resource_handler).options(preflight_handler))
        .route(&format!("{}/*path", resource), get(resource_handler).options(preflight_handler))
        // Search and SPARQL
        .route(
            &service,
            get(service_handler).post(service_handler).options(preflight_handler),
        )
        .route(
            &format!("{}/*path", service),
            get(service_handler).post(service_handler).options(preflight_handler),
        )
        // Health checks
        .route(&health, get(health_handler))
        .route(&format!("{}/live", health), get(liveness_handler))
        .with_state(state)
}
