//! Route dispatch.
//!
//! The [`Dispatcher`] owns the configuration and the injected backends and
//! runs the resolution pipeline once per request:
//!
//! ```text
//! RequestContext
//!   → graph selection
//!   → negotiate (format, language)
//!   → classify_network + extract_identity (AccessDecision)
//!   → resolve_resource / resolve_service
//!   → storage call, access policy
//!   → LdpResponse
//! ```
//!
//! Every branch ends in an [`LdpResponse`]; errors are mapped here and never
//! escape.

use chrono::{SecondsFormat, Utc};
use http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, LINK, LOCATION, VARY,
};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::access::{classify_network, NetworkPolicy};
use crate::auth::{AuthError, Authorization};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::identity::extract_identity;
use crate::negotiate::{negotiate, NegotiatedRepresentation};
use crate::resolve::{resolve_resource, resolve_service, service_endpoint};
use crate::store::{LinkedDataStorage, StorageError};
use crate::types::{
    AccessDecision, AccessRights, Format, LdpResponse, RequestContext, ResourceAddress, SearchQuery,
    ServiceEndpoint, ServiceRoute, Variant, DESCRIPTION_FORMATS, PLAIN_FORMATS, QUERY_FORMATS,
};

const SPARQL_UPDATE: &str = "application/sparql-update";
const SPARQL_QUERY: &str = "application/sparql-query";

/// Status string the storage backend reports for an applied update.
const UPDATE_APPLIED: &str = "201";

/// Errors raised while initializing backends at startup.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The storage backend refused to initialize.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The authorization backend refused to initialize.
    #[error(transparent)]
    Authorization(#[from] AuthError),
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Configured service name.
    pub name: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Backend dependency status, authorization first, storage overriding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
}

/// Request pipeline shared by every handler.
pub struct Dispatcher {
    config: Arc<GatewayConfig>,
    network: NetworkPolicy,
    storage: Option<Arc<dyn LinkedDataStorage>>,
    authorization: Option<Arc<dyn Authorization>>,
}

impl Dispatcher {
    /// Create a dispatcher without backends.
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let network = NetworkPolicy::from_config(&config.network);
        tracing::debug!(
            institution_ranges = network.institution.len(),
            library_ranges = network.library.len(),
            "Network policy loaded"
        );
        Self {
            config,
            network,
            storage: None,
            authorization: None,
        }
    }

    /// Register the storage backend.
    pub fn with_storage(mut self, storage: Arc<dyn LinkedDataStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Register the authorization backend.
    pub fn with_authorization(mut self, authorization: Arc<dyn Authorization>) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Call `init` on every registered backend. Run once before serving.
    pub async fn initialize(&self) -> Result<(), InitError> {
        match &self.storage {
            Some(storage) => storage.init(&self.config).await?,
            None => tracing::warn!("No storage backend registered, resource requests will fail"),
        }
        if let Some(auth) = &self.authorization {
            auth.init(&self.config).await?;
        }
        Ok(())
    }

    /// Shared configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handle a request on the resource endpoint.
    pub async fn handle_resource(&self, ctx: &RequestContext) -> LdpResponse {
        let result = match *ctx.method() {
            Method::GET | Method::HEAD => self.resource(ctx).await,
            _ => Err(GatewayError::NotImplemented(ctx.method().to_string())),
        };
        self.finish(result)
    }

    /// Handle a request on the service endpoint.
    pub async fn handle_service(&self, ctx: &RequestContext) -> LdpResponse {
        let result = match *ctx.method() {
            Method::GET | Method::HEAD => self.service_get(ctx).await,
            Method::POST => self.service_post(ctx).await,
            _ => Err(GatewayError::NotImplemented(ctx.method().to_string())),
        };
        self.finish(result)
    }

    /// Answer a CORS preflight.
    pub fn preflight(&self) -> LdpResponse {
        let cors = &self.config.cors;
        LdpResponse::new(StatusCode::OK)
            .with_header(ACCESS_CONTROL_ALLOW_METHODS, &cors.allow_methods)
            .with_header(ACCESS_CONTROL_ALLOW_HEADERS, &cors.allow_headers)
            .with_header(ACCESS_CONTROL_ALLOW_ORIGIN, &cors.allow_origin)
            .with_header(ACCEPT, &cors.accept)
    }

    /// Answer a request that failed before reaching the pipeline.
    pub fn reject(&self, err: GatewayError) -> LdpResponse {
        self.finish(Err(err))
    }

    /// Collect backend health.
    pub async fn health(&self) -> HealthReport {
        let mut dependencies = BTreeMap::new();
        if let Some(auth) = &self.authorization {
            dependencies.extend(auth.health(&self.config).await);
        }
        if let Some(storage) = &self.storage {
            dependencies.extend(storage.health(&self.config).await);
        }
        HealthReport {
            name: self.config.service.name.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            dependencies: (!dependencies.is_empty()).then_some(dependencies),
        }
    }

    // ------------------------------------------------------------------
    // Resource endpoint
    // ------------------------------------------------------------------

    async fn resource(&self, ctx: &RequestContext) -> Result<LdpResponse, GatewayError> {
        let graph = self.select_graph(ctx)?;
        let representation = negotiate(ctx.headers(), ctx.query(), &self.config.service.language_default);
        let decision = self.access_decision(ctx).await?;

        let base = self.base_url(ctx);
        let address = resolve_resource(&graph, ctx.path_info(), ctx.servlet_path(), &base)?;

        match address.variant {
            Variant::Plain => {
                representation.checked_format(PLAIN_FORMATS)?;
                let location = address.redirect_target();
                tracing::debug!(location = %location, "Redirecting to description");
                Ok(LdpResponse::new(StatusCode::SEE_OTHER)
                    .with_header(LOCATION, &location)
                    .with_header(VARY, "Accept"))
            }
            Variant::About | Variant::AboutMeta => {
                self.describe(&address, representation, &decision).await
            }
        }
    }

    async fn describe(
        &self,
        address: &ResourceAddress,
        representation: NegotiatedRepresentation,
        decision: &AccessDecision,
    ) -> Result<LdpResponse, GatewayError> {
        let representation = match address.format_override {
            Some(format) => representation.with_override(format),
            None => representation,
        };
        let format = representation.checked_format(DESCRIPTION_FORMATS)?;
        let uri = address.subject_uri();

        let body = self
            .fetch_permitted(&address.graph, &uri, format, decision, "Resource not found!".to_string())
            .await?;

        let response = LdpResponse::ok(&format.content_type(), body);
        Ok(match address.variant {
            Variant::About => response.with_header(LINK, &address.meta_link()),
            Variant::Plain | Variant::AboutMeta => response,
        })
    }

    /// Fetch a document, then gate it on its access rights.
    async fn fetch_permitted(
        &self,
        graph: &str,
        uri: &str,
        format: Format,
        decision: &AccessDecision,
        not_found: String,
    ) -> Result<String, GatewayError> {
        let storage = self.storage()?;
        let body = storage
            .get_resource(graph, uri, format, decision.is_authenticated())
            .await?
            .ok_or(GatewayError::NotFound(not_found))?;

        let rights = AccessRights::parse(&storage.get_access_rights(graph, uri).await?);
        if !decision.permits(&rights) {
            tracing::warn!(
                uri = %uri,
                rights = %rights,
                tier = %decision.network_tier(),
                authenticated = decision.is_authenticated(),
                "Access denied"
            );
            return Err(GatewayError::Forbidden(self.config.service.forbidden_message.clone()));
        }
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Service endpoint
    // ------------------------------------------------------------------

    async fn service_get(&self, ctx: &RequestContext) -> Result<LdpResponse, GatewayError> {
        let graph = self.select_graph(ctx)?;
        let representation = negotiate(ctx.headers(), ctx.query(), &self.config.service.language_default);
        let decision = self.access_decision(ctx).await?;

        match resolve_service(ctx.path_info(), ctx.query())? {
            ServiceRoute::Resource { uri } => {
                let format = representation.checked_format(DESCRIPTION_FORMATS)?;
                let body = self
                    .fetch_permitted(&graph, &uri, format, &decision, format!("Resource <{}> not found!", uri))
                    .await?;
                Ok(LdpResponse::ok(&format.content_type(), body))
            }
            ServiceRoute::Search(query) => self.search(&graph, &query, &representation, &decision).await,
            ServiceRoute::Sparql { query } => self.sparql(&graph, &query, &representation, &decision).await,
        }
    }

    async fn service_post(&self, ctx: &RequestContext) -> Result<LdpResponse, GatewayError> {
        let graph = self.select_graph(ctx)?;
        if service_endpoint(ctx.path_info())? != ServiceEndpoint::Sparql {
            return Err(GatewayError::NotImplemented(ctx.path_info().to_string()));
        }
        let representation = negotiate(ctx.headers(), ctx.query(), &self.config.service.language_default);
        let decision = self.access_decision(ctx).await?;

        let content_type = ctx.header(CONTENT_TYPE).unwrap_or_default().to_ascii_lowercase();
        let body = ctx.body();

        if content_type.starts_with(SPARQL_UPDATE) {
            if body.trim().is_empty() {
                return Err(GatewayError::NoContent);
            }
            let status = self.storage()?.sparql_update(body).await?;
            if status.trim() == UPDATE_APPLIED {
                tracing::debug!("SPARQL update applied");
                Ok(LdpResponse::text(StatusCode::CREATED, "Created"))
            } else {
                Err(GatewayError::UpdateRejected(status))
            }
        } else if content_type.starts_with(SPARQL_QUERY) {
            representation.checked_format(QUERY_FORMATS)?;
            if body.trim().is_empty() {
                return Err(GatewayError::NoContent);
            }
            self.sparql(&graph, body, &representation, &decision).await
        } else {
            Err(GatewayError::UnsupportedContentType(content_type))
        }
    }

    async fn search(
        &self,
        graph: &str,
        query: &SearchQuery,
        representation: &NegotiatedRepresentation,
        decision: &AccessDecision,
    ) -> Result<LdpResponse, GatewayError> {
        let format = representation.checked_format(QUERY_FORMATS)?;
        let body = self
            .storage()?
            .search_resource(graph, query, format, decision.is_authenticated())
            .await?
            .ok_or_else(|| GatewayError::NotFound("No resources found!".to_string()))?;
        Ok(LdpResponse::ok(&format.content_type(), body))
    }

    async fn sparql(
        &self,
        graph: &str,
        query: &str,
        representation: &NegotiatedRepresentation,
        decision: &AccessDecision,
    ) -> Result<LdpResponse, GatewayError> {
        let format = representation.checked_format(QUERY_FORMATS)?;
        let body = self
            .storage()?
            .sparql_query(graph, query, format, decision.is_authenticated())
            .await?
            .ok_or_else(|| GatewayError::NotFound("Resource not found!".to_string()))?;
        Ok(LdpResponse::ok(&format.result_content_type(), body))
    }

    // ------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------

    fn select_graph(&self, ctx: &RequestContext) -> Result<String, GatewayError> {
        let graph = ctx
            .query()
            .get_non_empty("graph")
            .or_else(|| ctx.query().get_non_empty("profile"))
            .unwrap_or(self.config.storage.graph_default.as_str());
        if self.config.is_graph_allowed(graph) {
            Ok(graph.to_string())
        } else {
            Err(GatewayError::InvalidGraph(graph.to_string()))
        }
    }

    async fn access_decision(&self, ctx: &RequestContext) -> Result<AccessDecision, GatewayError> {
        let network = classify_network(ctx.forwarded_for(), &self.network);
        let identity = extract_identity(
            ctx.headers(),
            ctx.cookies(),
            self.authorization.as_deref(),
            &self.config.auth,
        )
        .await?;
        let decision = AccessDecision::new(network, identity);
        tracing::debug!(
            tier = %decision.network_tier(),
            authenticated = decision.is_authenticated(),
            "Access decision"
        );
        Ok(decision)
    }

    /// Configured base URL, or `http://<Host>` in test mode.
    fn base_url(&self, ctx: &RequestContext) -> String {
        if self.config.service.istest {
            match ctx.host() {
                Some(host) => return format!("http://{}", host),
                None => tracing::warn!("Test mode without Host header, using configured base URL"),
            }
        }
        self.config.base_url().to_string()
    }

    fn storage(&self) -> Result<&dyn LinkedDataStorage, GatewayError> {
        self.storage.as_deref().ok_or(GatewayError::StorageUnavailable)
    }

    fn finish(&self, result: Result<LdpResponse, GatewayError>) -> LdpResponse {
        let response = match result {
            Ok(response) => response,
            Err(err) => error_response(&err),
        };
        response.with_header(ACCESS_CONTROL_ALLOW_ORIGIN, &self.config.cors.allow_origin)
    }
}

/// Convert an error into the response the caller sees.
pub fn error_response(err: &GatewayError) -> LdpResponse {
    let status = err.status_code();
    if err.is_server_fault() {
        tracing::error!(error = %err, status = status.as_u16(), "Backend failure");
    } else {
        tracing::warn!(error = %err, status = status.as_u16(), "Request rejected");
    }
    if status == StatusCode::NO_CONTENT {
        LdpResponse::new(status)
    } else {
        LdpResponse::text(status, err.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStorage;

    const URI: &str = "http://localhost:8080/resource/x";

    fn dispatcher(storage: Arc<InMemoryStorage>) -> Dispatcher {
        Dispatcher::new(Arc::new(GatewayConfig::default())).with_storage(storage)
    }

    #[tokio::test]
    async fn test_invalid_graph() {
        let d = dispatcher(Arc::new(InMemoryStorage::new()));
        let ctx = RequestContext::get("/resource", "/x/about").with_query("graph=other");
        let r = d.handle_resource(&ctx).await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert_eq!(r.body(), "Bad request - graph is not valid!");
        assert_eq!(r.header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn test_about_serves_with_link() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.add_document("default", URI, Format::Turtle, "<x> <y> <z> .");
        storage.set_access_rights("default", URI, "public");
        let d = dispatcher(storage);

        let r = d.handle_resource(&RequestContext::get("/resource", "/x/about.ttl")).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.header("content-type"), Some("text/turtle;charset=UTF-8"));
        assert_eq!(r.header("link"), Some("<http://localhost:8080/resource/x/about-meta>; rel=meta"));
        assert_eq!(r.body(), "<x> <y> <z> .");
    }

    #[tokio::test]
    async fn test_missing_storage_is_unavailable() {
        let d = Dispatcher::new(Arc::new(GatewayConfig::default()));
        let r = d.handle_resource(&RequestContext::get("/resource", "/x/about")).await;
        assert_eq!(r.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(r.body(), crate::error::BACKEND_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_test_mode_uses_host_header() {
        let mut config = GatewayConfig::default();
        config.service.istest = true;
        let d = Dispatcher::new(Arc::new(config)).with_storage(Arc::new(InMemoryStorage::new()));
        let ctx = RequestContext::get("/resource", "/x").with_header("host", "127.0.0.1:9999");
        let r = d.handle_resource(&ctx).await;
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(r.header("location"), Some("http://127.0.0.1:9999/resource/x/about"));
    }

    #[tokio::test]
    async fn test_preflight_echoes_cors() {
        let d = dispatcher(Arc::new(InMemoryStorage::new()));
        let r = d.preflight();
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.header("access-control-allow-origin"), Some("*"));
        assert!(r.header("access-control-allow-methods").is_some());
    }

    #[tokio::test]
    async fn test_health_merges_dependencies() {
        let d = dispatcher(Arc::new(InMemoryStorage::new()))
            .with_authorization(Arc::new(crate::auth::StaticTokenAuthorization::new()));
        let report = d.health().await;
        assert_eq!(report.name, "ldp");
        let deps = report.dependencies.unwrap();
        assert_eq!(deps.get("storage").map(String::as_str), Some("ok"));
        assert_eq!(deps.get("authorization").map(String::as_str), Some("ok"));
    }

    #[test]
    fn test_no_content_has_empty_body() {
        let r = error_response(&GatewayError::NoContent);
        assert_eq!(r.status(), StatusCode::NO_CONTENT);
        assert_eq!(r.body(), "");
        assert!(r.header("content-type").is_none());
    }
}
