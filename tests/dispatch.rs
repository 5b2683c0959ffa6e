//! Dispatcher scenarios against the in-memory backends.
//!
//! Each test builds a fresh dispatcher, seeds storage and drives one or two
//! requests through the full pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use ldp_gateway::auth::AuthError;
use ldp_gateway::{
    Authorization, Dispatcher, Format, GatewayConfig, InMemoryStorage, RequestContext, StaticTokenAuthorization,
    StorageError,
};

const GRAPH: &str = "main";
const BASE: &str = "http://data.example.org";
const X: &str = "http://data.example.org/resource/x";

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.resource.baseurl = BASE.to_string();
    config.storage.graph_default = GRAPH.to_string();
    config.storage.graphs = vec![GRAPH.to_string(), "archive".to_string()];
    config.network.institution_ranges = vec!["10.0.0.0/8".to_string()];
    config.network.library_ranges = vec!["10.1.0.0/16".to_string()];
    config.network.library_exceptions = vec!["10.1.0.99".to_string()];
    config.service.forbidden_message = "Members only".to_string();
    config
}

fn setup() -> (Arc<InMemoryStorage>, Dispatcher) {
    let storage = Arc::new(InMemoryStorage::new());
    let dispatcher = Dispatcher::new(Arc::new(config())).with_storage(storage.clone());
    (storage, dispatcher)
}

fn seed_all_formats(storage: &InMemoryStorage, uri: &str, rights: &str) {
    for format in [Format::Html, Format::RdfXml, Format::Turtle, Format::JsonLd, Format::NQuads] {
        storage.add_document(GRAPH, uri, format, format!("{} in {}", uri, format));
    }
    storage.set_access_rights(GRAPH, uri, rights);
}

fn resource(path: &str) -> RequestContext {
    RequestContext::get("/resource", path)
}

fn session_cookie(token: &str, patron: &str) -> String {
    let json = format!(r#"{{"access_token":"{}","patron":"{}"}}"#, token, patron);
    let encoded: String = url::form_urlencoded::byte_serialize(json.as_bytes()).collect();
    format!("PaiaService={}", encoded)
}

struct UnreachableAuth;

#[async_trait]
impl Authorization for UnreachableAuth {
    async fn init(&self, _config: &GatewayConfig) -> Result<(), AuthError> {
        Ok(())
    }

    async fn health(&self, _config: &GatewayConfig) -> BTreeMap<String, String> {
        BTreeMap::from([("authorization".to_string(), "unreachable".to_string())])
    }

    async fn is_token_valid(&self, _: &str, _: &str, _: &str) -> Result<bool, AuthError> {
        Err(AuthError::Unreachable("connection refused".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource Endpoint
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plain_path_redirects_without_fetch() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "public");

    let r = dispatcher.handle_resource(&resource("/x")).await;

    assert_eq!(r.status(), StatusCode::SEE_OTHER);
    assert_eq!(r.header("location"), Some("http://data.example.org/resource/x/about"));
    assert_eq!(r.header("vary"), Some("Accept"));
    assert_eq!(storage.fetch_count(), 0);
}

#[tokio::test]
async fn test_plain_path_validates_format() {
    let (_, dispatcher) = setup();

    let rdfa = dispatcher.handle_resource(&resource("/x").with_query("format=rdfa")).await;
    assert_eq!(rdfa.status(), StatusCode::SEE_OTHER);

    let xml = dispatcher.handle_resource(&resource("/x").with_query("format=xml")).await;
    assert_eq!(xml.status(), StatusCode::BAD_REQUEST);
    assert_eq!(xml.body(), "No valid {format} requested: xml");
}

#[tokio::test]
async fn test_accept_ld_json_serves_json_ld() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "public");

    let ctx = resource("/x/about").with_header("accept", "application/ld+json");
    let r = dispatcher.handle_resource(&ctx).await;

    assert_eq!(r.status(), StatusCode::OK);
    assert_eq!(r.header("content-type"), Some("application/ld+json;charset=UTF-8"));
    assert_eq!(r.body(), format!("{} in json", X));
    assert_eq!(r.header("link"), Some("<http://data.example.org/resource/x/about-meta>; rel=meta"));
}

#[tokio::test]
async fn test_about_meta_suffix_and_negotiation() {
    let (storage, dispatcher) = setup();
    let meta = format!("{}/about", X);
    seed_all_formats(&storage, &meta, "public");

    let suffixed = dispatcher.handle_resource(&resource("/x/about-meta.ttl")).await;
    assert_eq!(suffixed.status(), StatusCode::OK);
    assert_eq!(suffixed.header("content-type"), Some("text/turtle;charset=UTF-8"));
    assert_eq!(suffixed.body(), format!("{} in rdf.ttl", meta));
    assert!(suffixed.header("link").is_none());

    let negotiated = dispatcher
        .handle_resource(&resource("/x/about-meta").with_header("accept", "application/n-quads"))
        .await;
    assert_eq!(negotiated.status(), StatusCode::OK);
    assert_eq!(negotiated.body(), format!("{} in nquads", meta));
}

#[tokio::test]
async fn test_suffix_beats_format_parameter() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "public");

    let r = dispatcher
        .handle_resource(&resource("/x/about.rdf.xml").with_query("format=json"))
        .await;
    assert_eq!(r.header("content-type"), Some("application/rdf+xml;charset=UTF-8"));
}

#[tokio::test]
async fn test_description_rejects_rdfa_and_unknown_suffix() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "public");

    let rdfa = dispatcher
        .handle_resource(&resource("/x/about").with_header("accept", "application/xhtml+xml"))
        .await;
    assert_eq!(rdfa.status(), StatusCode::BAD_REQUEST);

    let pdf = dispatcher.handle_resource(&resource("/x/about.pdf")).await;
    assert_eq!(pdf.status(), StatusCode::BAD_REQUEST);
    assert_eq!(pdf.body(), "No valid {format} requested: pdf");
}

#[tokio::test]
async fn test_missing_resource_is_not_found() {
    let (_, dispatcher) = setup();
    let r = dispatcher.handle_resource(&resource("/nothing/about")).await;
    assert_eq!(r.status(), StatusCode::NOT_FOUND);
    assert_eq!(r.body(), "Resource not found!");
}

#[tokio::test]
async fn test_internal_resource_forbidden_for_external_anonymous() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "internal");

    for format in ["html", "rdf.xml", "rdf.ttl", "json", "nquads"] {
        let ctx = resource("/x/about")
            .with_query(&format!("format={}", format))
            .with_header("x-forwarded-for", "8.8.8.8");
        let r = dispatcher.handle_resource(&ctx).await;
        assert_eq!(r.status(), StatusCode::FORBIDDEN, "format {}", format);
        assert_eq!(r.body(), "Members only");
    }
}

#[tokio::test]
async fn test_internal_resource_by_network_tier() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "internal");

    let library = resource("/x/about").with_header("x-forwarded-for", "10.1.2.3");
    assert_eq!(dispatcher.handle_resource(&library).await.status(), StatusCode::OK);

    // proxy chain: any entry counts
    let chained = resource("/x/about").with_header("x-forwarded-for", "8.8.8.8, 10.1.2.3");
    assert_eq!(dispatcher.handle_resource(&chained).await.status(), StatusCode::OK);

    let excepted = resource("/x/about").with_header("x-forwarded-for", "10.1.0.99");
    assert_eq!(dispatcher.handle_resource(&excepted).await.status(), StatusCode::FORBIDDEN);

    let institution = resource("/x/about").with_header("x-forwarded-for", "10.200.0.1");
    assert_eq!(dispatcher.handle_resource(&institution).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_restricted_resource_requires_valid_token() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_all_formats(&storage, X, "restricted");
    let mut auth = StaticTokenAuthorization::new();
    auth.add_token("abc", Some("p1".to_string()));
    let dispatcher = Dispatcher::new(Arc::new(config()))
        .with_storage(storage.clone())
        .with_authorization(Arc::new(auth));

    let library_only = resource("/x/about").with_header("x-forwarded-for", "10.1.2.3");
    assert_eq!(dispatcher.handle_resource(&library_only).await.status(), StatusCode::FORBIDDEN);

    let cookie = session_cookie("abc", "p1");
    let logged_in = resource("/x/about").with_header("cookie", &cookie);
    assert_eq!(dispatcher.handle_resource(&logged_in).await.status(), StatusCode::OK);

    let wrong_patron = session_cookie("abc", "p2");
    let r = dispatcher
        .handle_resource(&resource("/x/about").with_header("cookie", &wrong_patron))
        .await;
    assert_eq!(r.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_session_cookie_is_bad_request() {
    let (storage, dispatcher) = setup();
    seed_all_formats(&storage, X, "public");

    let ctx = resource("/x/about").with_header("cookie", "PaiaService=%7Bbroken");
    let r = dispatcher.handle_resource(&ctx).await;
    assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    assert_eq!(storage.fetch_count(), 0);
}

#[tokio::test]
async fn test_authorization_failure_evaluates_as_anonymous() {
    let storage = Arc::new(InMemoryStorage::new());
    seed_all_formats(&storage, X, "public");
    let y = "http://data.example.org/resource/y";
    seed_all_formats(&storage, y, "internal");
    let dispatcher = Dispatcher::new(Arc::new(config()))
        .with_storage(storage.clone())
        .with_authorization(Arc::new(UnreachableAuth));

    let public = resource("/x/about").with_header("authorization", "Bearer abc");
    assert_eq!(dispatcher.handle_resource(&public).await.status(), StatusCode::OK);

    let internal = resource("/y/about").with_header("authorization", "Bearer abc");
    assert_eq!(dispatcher.handle_resource(&internal).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_graph_selection() {
    let (storage, dispatcher) = setup();
    storage.add_document("archive", X, Format::Html, "archived");
    storage.set_access_rights("archive", X, "public");

    let by_profile = dispatcher.handle_resource(&resource("/x/about").with_query("profile=archive")).await;
    assert_eq!(by_profile.status(), StatusCode::OK);
    assert_eq!(by_profile.body(), "archived");

    let unknown = dispatcher.handle_resource(&resource("/x/about").with_query("graph=arch")).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_hides_cause() {
    let (storage, dispatcher) = setup();
    storage.fail_with(StorageError::Unreachable("triplestore on 10.0.0.7 refused".to_string()));

    let r = dispatcher.handle_resource(&resource("/x/about")).await;
    assert_eq!(r.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!r.body().contains("10.0.0.7"));
    assert_eq!(r.header("access-control-allow-origin"), Some("*"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Endpoint
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_service_resource_by_uri() {
    let (storage, dispatcher) = setup();
    storage.add_document(GRAPH, "http://example.org/x", Format::JsonLd, r#"{"@id":"x"}"#);
    storage.set_access_rights(GRAPH, "http://example.org/x", "public");

    let ctx = RequestContext::get("/ldp", "/resource").with_query("uri=http://example.org/x&format=json");
    let r = dispatcher.handle_service(&ctx).await;

    assert_eq!(r.status(), StatusCode::OK);
    assert_eq!(r.header("content-type"), Some("application/ld+json;charset=UTF-8"));
    assert_eq!(r.body(), r#"{"@id":"x"}"#);
}

#[tokio::test]
async fn test_service_resource_errors() {
    let (_, dispatcher) = setup();

    let missing = dispatcher.handle_service(&RequestContext::get("/ldp", "/resource")).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(missing.body(), "Bad request. Parameter 'uri' not defined!");

    let absent = dispatcher
        .handle_service(&RequestContext::get("/ldp", "/resource").with_query("uri=http%3A%2F%2Fexample.org%2Fnone"))
        .await;
    assert_eq!(absent.status(), StatusCode::NOT_FOUND);
    assert_eq!(absent.body(), "Resource <http://example.org/none> not found!");
}

#[tokio::test]
async fn test_search() {
    let (storage, dispatcher) = setup();
    storage.set_search_result(GRAPH, "rust", "<results/>");

    let ok = dispatcher
        .handle_service(&RequestContext::get("/ldp", "/search").with_query("q=rust&format=xml&fq=a&fq=b"))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(ok.header("content-type"), Some("application/xml;charset=UTF-8"));
    assert_eq!(ok.body(), "<results/>");

    let none = dispatcher
        .handle_service(&RequestContext::get("/ldp", "/search").with_query("q=cobol"))
        .await;
    assert_eq!(none.status(), StatusCode::NOT_FOUND);

    let turtle = dispatcher
        .handle_service(&RequestContext::get("/ldp", "/search").with_query("q=rust&format=ttl"))
        .await;
    assert_eq!(turtle.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sparql_get_format_override() {
    let (storage, dispatcher) = setup();
    storage.set_sparql_result(GRAPH, "SELECT * WHERE { ?s ?p ?o }", "<sparql/>");

    let ctx = RequestContext::get("/ldp", "/sparql")
        .with_query("q=SELECT+*+WHERE+%7B+%3Fs+%3Fp+%3Fo+%7D&format=xml")
        .with_header("accept", "text/html");
    let r = dispatcher.handle_service(&ctx).await;
    assert_eq!(r.status(), StatusCode::OK);
    assert_eq!(r.header("content-type"), Some("application/xml;charset=UTF-8"));

    let json = dispatcher
        .handle_service(
            &RequestContext::get("/ldp", "/sparql").with_query("q=SELECT+*+WHERE+%7B+%3Fs+%3Fp+%3Fo+%7D&format=json"),
        )
        .await;
    assert_eq!(json.header("content-type"), Some("application/json;charset=UTF-8"));

    let no_query = dispatcher.handle_service(&RequestContext::get("/ldp", "/sparql")).await;
    assert_eq!(no_query.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sparql_update_empty_body_is_no_content() {
    let (storage, dispatcher) = setup();

    let ctx = RequestContext::post("/ldp", "/sparql").with_header("content-type", "application/sparql-update");
    let r = dispatcher.handle_service(&ctx).await;

    assert_eq!(r.status(), StatusCode::NO_CONTENT);
    assert_eq!(r.body(), "");
    assert!(storage.updates().is_empty());
}

#[tokio::test]
async fn test_sparql_update_status_mapping() {
    let (storage, dispatcher) = setup();
    let update = "INSERT DATA { <a> <b> <c> }";
    let ctx = RequestContext::post("/ldp", "/sparql")
        .with_header("content-type", "application/sparql-update")
        .with_body(update);

    let created = dispatcher.handle_service(&ctx).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(created.body(), "Created");
    assert_eq!(storage.updates(), vec![update.to_string()]);

    storage.set_update_status("500");
    let rejected = dispatcher.handle_service(&ctx).await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    assert_eq!(rejected.body(), "something went wrong!");
}

#[tokio::test]
async fn test_sparql_query_by_post() {
    let (storage, dispatcher) = setup();
    storage.set_sparql_result(GRAPH, "ASK { ?s ?p ?o }", "<html>true</html>");

    let ctx = RequestContext::post("/ldp", "/sparql")
        .with_header("content-type", "application/sparql-query")
        .with_body("ASK { ?s ?p ?o }");
    let r = dispatcher.handle_service(&ctx).await;
    assert_eq!(r.status(), StatusCode::OK);
    assert_eq!(r.header("content-type"), Some("text/html;charset=UTF-8"));

    let empty = RequestContext::post("/ldp", "/sparql").with_header("content-type", "application/sparql-query");
    assert_eq!(dispatcher.handle_service(&empty).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_sparql_query_by_post_checks_format_before_body() {
    let (storage, dispatcher) = setup();

    let empty_turtle = RequestContext::post("/ldp", "/sparql")
        .with_query("format=ttl")
        .with_header("content-type", "application/sparql-query");
    let r = dispatcher.handle_service(&empty_turtle).await;
    assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    assert_eq!(r.header("access-control-allow-origin"), Some("*"));

    let empty_json = RequestContext::post("/ldp", "/sparql")
        .with_query("format=json")
        .with_header("content-type", "application/sparql-query");
    assert_eq!(dispatcher.handle_service(&empty_json).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(storage.fetch_count(), 0);
}

#[tokio::test]
async fn test_post_rejections() {
    let (_, dispatcher) = setup();

    let wrong_type = RequestContext::post("/ldp", "/sparql")
        .with_header("content-type", "text/plain")
        .with_body("x");
    let r = dispatcher.handle_service(&wrong_type).await;
    assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    assert_eq!(r.body(), "Content-type has to be 'application/sparql-update'!");

    let wrong_route = RequestContext::post("/ldp", "/search").with_body("x");
    assert_eq!(dispatcher.handle_service(&wrong_route).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_service_route() {
    let (_, dispatcher) = setup();
    let r = dispatcher.handle_service(&RequestContext::get("/ldp", "/describe")).await;
    assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    assert_eq!(r.body(), "You requested a not implemented service!");
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_initialize_calls_backends() {
    let (storage, dispatcher) = setup();
    assert!(!storage.is_initialized());
    dispatcher.initialize().await.unwrap();
    assert!(storage.is_initialized());
}

#[tokio::test]
async fn test_health_prefers_storage_on_collision() {
    let storage = Arc::new(InMemoryStorage::new());
    let dispatcher = Dispatcher::new(Arc::new(config()))
        .with_storage(storage)
        .with_authorization(Arc::new(UnreachableAuth));

    let report = dispatcher.health().await;
    let deps = report.dependencies.unwrap();
    assert_eq!(deps.get("authorization").map(String::as_str), Some("unreachable"));
    assert_eq!(deps.get("storage").map(String::as_str), Some("ok"));
}
