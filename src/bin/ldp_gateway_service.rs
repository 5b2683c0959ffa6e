//! LDP Gateway Service Binary
//!
//! Runs the gateway as an HTTP service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! - `-conf=<path>` / `--config=<path>` or `LDP_CONFIG`: TOML config file
//!   (default: `conf/config.toml`)
//! - `HOST` / `PORT`: override the configured bind address
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Storage
//!
//! The binary runs on the bundled in-memory backend, which serves the
//! `[[storage.documents]]` entries of the config file. Production
//! deployments embed the library and register their own
//! [`LinkedDataStorage`](ldp_gateway::LinkedDataStorage) adapter through
//! `Dispatcher::with_storage`.
//!
//! ## Usage
//!
//! ```bash
//! LDP_CONFIG=conf/config.toml cargo run --bin ldp_gateway_service
//! ```

use std::sync::Arc;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use ldp_gateway::service::{create_router, request_logging_middleware, ServiceState};
use ldp_gateway::{Dispatcher, GatewayConfig, InMemoryStorage, StaticTokenAuthorization};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ldp_gateway=info,ldp_gateway_service=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    info!(version = version, "Starting LDP Gateway Service");

    let config_path = GatewayConfig::path_from_args(std::env::args().skip(1));
    let mut config = match GatewayConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    config.apply_env_overrides();
    info!(
        path = %config_path.display(),
        service = %config.service.name,
        base_url = %config.base_url(),
        graphs = ?config.storage.graphs,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let mut dispatcher = Dispatcher::new(Arc::clone(&config)).with_storage(Arc::new(InMemoryStorage::new()));

    if config.auth.tokens.is_empty() {
        warn!("No tokens configured, authorization backend disabled");
    } else {
        let auth = StaticTokenAuthorization::from_tokens(&config.auth.tokens);
        info!(token_count = auth.len(), "Static token authorization enabled");
        dispatcher = dispatcher.with_authorization(Arc::new(auth));
    }

    if let Err(e) = dispatcher.initialize().await {
        error!(error = %e, "Backend initialization failed");
        return Err(e.into());
    }

    let app = create_router(ServiceState::new(dispatcher))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_address()?;
    info!(
        address = %addr,
        resource = %config.resource_mount(),
        service = %config.service_mount(),
        version = version,
        "LDP Gateway Service listening"
    );

    let listener = TcpListener::bind(addr).await?;

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("LDP Gateway Service shutdown complete");

    Ok(())
}
