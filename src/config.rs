//! Gateway configuration.
//!
//! One immutable [`GatewayConfig`] is loaded at startup from a TOML file and
//! shared by `Arc` with every component. Every field has a default, so a
//! file only needs the values that differ.
//!
//! ## Sources
//!
//! - Config file: `-conf=<path>` / `--config=<path>` argument, else
//!   `LDP_CONFIG`, else `conf/config.toml`
//! - `HOST` / `PORT`: override `service.host` / `service.port`
//!
//! ## Example
//!
//! ```toml
//! [service]
//! name = "ldp"
//! port = 8080
//! language_default = "de"
//!
//! [network]
//! institution_ranges = ["129.217.0.0/16"]
//! library_ranges = ["129.217.132.0/24"]
//! library_exceptions = ["129.217.132.10"]
//!
//! [storage]
//! graph_default = "main"
//! graphs = ["main"]
//!
//! [resource]
//! baseurl = "http://data.example.org"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::types::Format;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LDP_CONFIG";

/// Errors raised while loading configuration. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read '{path}': {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Values are individually valid but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Process-level service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, reported by the health endpoint and in logs.
    pub name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Context path every endpoint is mounted under (`""` for root).
    pub contextpath: String,
    /// Language used when neither `Accept-Language` nor `lang` decide.
    pub language_default: String,
    /// Body of `403 Forbidden` responses.
    pub forbidden_message: String,
    /// Synthesize the resource base URL from the request `Host` header.
    pub istest: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "ldp".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            contextpath: String::new(),
            language_default: "de".to_string(),
            forbidden_message: "Forbidden - you are not allowed to access this resource!".to_string(),
            istest: false,
        }
    }
}

/// Endpoint mount points, relative to `service.contextpath`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Resource endpoint (`/resource/{path}`); also the servlet path used in
    /// canonical URIs.
    pub resource_contextpath: String,
    /// Service endpoint (`/ldp/resource`, `/ldp/search`, `/ldp/sparql`).
    pub service_contextpath: String,
    /// Health endpoint; liveness is served at `<health>/live`.
    pub health: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            resource_contextpath: "/resource".to_string(),
            service_contextpath: "/ldp".to_string(),
            health: "/health".to_string(),
        }
    }
}

/// Address ranges for the two internal network tiers.
///
/// Entries are CIDR blocks, single addresses, `a-b` spans or IPv4 wildcards
/// (`129.217.*.*`); one entry may hold several separated by `,` or `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Institution network.
    pub institution_ranges: Vec<String>,
    /// Excluded from the institution network.
    pub institution_exceptions: Vec<String>,
    /// Library network.
    pub library_ranges: Vec<String>,
    /// Excluded from the library network.
    pub library_exceptions: Vec<String>,
}

/// A description preloaded by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDocument {
    /// Target graph; the default graph when absent.
    #[serde(default)]
    pub graph: Option<String>,
    /// Subject URI the description is stored under.
    pub uri: String,
    /// Wire token of the representation (`html`, `ttl`, `json`, ...).
    pub format: String,
    /// Access rights of the subject (`public`, `internal`, ...).
    #[serde(default)]
    pub rights: Option<String>,
    /// Document body.
    pub body: String,
}

/// Graph selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Graph used when the request does not name one.
    pub graph_default: String,
    /// Allow-list of graphs a request may target.
    pub graphs: Vec<String>,
    /// Documents the in-memory backend loads on `init`. Other backends
    /// ignore them.
    pub documents: Vec<SeedDocument>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_default: "default".to_string(),
            graphs: vec!["default".to_string()],
            documents: Vec::new(),
        }
    }
}

/// Canonical resource URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Absolute base URL resource URIs are minted under.
    pub baseurl: String,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            baseurl: "http://localhost:8080".to_string(),
        }
    }
}

/// Values echoed in CORS headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `Access-Control-Allow-Methods`.
    pub allow_methods: String,
    /// `Access-Control-Allow-Headers`.
    pub allow_headers: String,
    /// `Access-Control-Allow-Origin`, also set on every regular response.
    pub allow_origin: String,
    /// `Accept` advertised on preflight.
    pub accept: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: "GET, POST, OPTIONS".to_string(),
            allow_headers: "Accept, Accept-Language, Authorization, Content-Type".to_string(),
            allow_origin: "*".to_string(),
            accept: "text/html, application/rdf+xml, text/turtle, application/ld+json, application/n-quads"
                .to_string(),
        }
    }
}

/// A token accepted by the static authorization backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToken {
    /// Bearer token.
    pub token: String,
    /// Patron the token is bound to, if any.
    #[serde(default)]
    pub patron: Option<String>,
}

/// Identity extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying the URL-encoded login response.
    pub session_cookie: String,
    /// Resource class tokens are checked against.
    pub resource_class: String,
    /// Tokens for the static authorization backend. Empty means no
    /// authorization backend is registered.
    pub tokens: Vec<StaticToken>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "PaiaService".to_string(),
            resource_class: "data".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Process-level settings.
    pub service: ServiceConfig,
    /// Endpoint mount points.
    pub endpoints: EndpointConfig,
    /// Internal network ranges.
    pub network: NetworkConfig,
    /// Graph selection.
    pub storage: StorageConfig,
    /// Canonical resource URIs.
    pub resource: ResourceConfig,
    /// CORS header values.
    pub cors: CorsConfig,
    /// Identity extraction.
    pub auth: AuthConfig,
}

impl GatewayConfig {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve the config file path from process arguments and environment.
    pub fn path_from_args<I, S>(args: I) -> PathBuf
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if let Some(path) = arg
                .strip_prefix("-conf=")
                .or_else(|| arg.strip_prefix("--config="))
            {
                return PathBuf::from(path);
            }
        }
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Apply `HOST` / `PORT` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOST") {
            if !host.is_empty() {
                self.service.host = host;
            }
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|s| s.parse().ok()) {
            self.service.port = port;
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.storage.graphs.contains(&self.storage.graph_default) {
            return Err(ConfigError::Invalid(format!(
                "storage.graph_default '{}' is not listed in storage.graphs",
                self.storage.graph_default
            )));
        }

        for doc in &self.storage.documents {
            if Format::from_token(&doc.format).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "storage.documents: unknown format '{}' for <{}>",
                    doc.format, doc.uri
                )));
            }
            if let Some(graph) = &doc.graph {
                if !self.storage.graphs.contains(graph) {
                    return Err(ConfigError::Invalid(format!(
                        "storage.documents: graph '{}' for <{}> is not listed in storage.graphs",
                        graph, doc.uri
                    )));
                }
            }
        }

        let base = url::Url::parse(&self.resource.baseurl).map_err(|e| {
            ConfigError::Invalid(format!("resource.baseurl '{}': {}", self.resource.baseurl, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::Invalid(format!(
                "resource.baseurl must be http(s), got '{}'",
                self.resource.baseurl
            )));
        }

        for (name, path) in [
            ("endpoints.resource_contextpath", &self.endpoints.resource_contextpath),
            ("endpoints.service_contextpath", &self.endpoints.service_contextpath),
            ("endpoints.health", &self.endpoints.health),
        ] {
            if !path.starts_with('/') || path.len() < 2 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-root absolute path, got '{}'",
                    name, path
                )));
            }
        }
        if self.endpoints.resource_contextpath == self.endpoints.service_contextpath {
            return Err(ConfigError::Invalid(
                "resource and service endpoints must be mounted at different paths".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.resource.baseurl.trim_end_matches('/')
    }

    /// Full mount path of the resource endpoint.
    pub fn resource_mount(&self) -> String {
        self.mount(&self.endpoints.resource_contextpath)
    }

    /// Full mount path of the service endpoint.
    pub fn service_mount(&self) -> String {
        self.mount(&self.endpoints.service_contextpath)
    }

    /// Full path of the health endpoint.
    pub fn health_mount(&self) -> String {
        self.mount(&self.endpoints.health)
    }

    fn mount(&self, path: &str) -> String {
        format!("{}{}", self.service.contextpath.trim_end_matches('/'), path)
    }

    /// Socket address to bind.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.service.host, self.service.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address: {}", e)))
    }

    /// Whether `graph` is on the allow-list.
    pub fn is_graph_allowed(&self, graph: &str) -> bool {
        self.storage.graphs.iter().any(|g| g == graph)
    }
}
