//! Linked data storage backends.

pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::GatewayConfig;
use crate::types::{Format, SearchQuery};

/// Error type for storage operations.
///
/// The dispatcher maps every variant to `503 Service Unavailable`; the
/// message is logged, never shown to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// `init` was not called or failed.
    #[error("storage not initialized")]
    NotInitialized,
    /// The store could not be reached.
    #[error("storage unreachable: {0}")]
    Unreachable(String),
    /// The store rejected or failed the operation.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Trait for linked data storage backends.
///
/// Formats are passed through as [`Format`]; implementations that speak the
/// wire tokens use [`Format::token`]. Absent results are `Ok(None)`, not
/// errors.
#[async_trait]
pub trait LinkedDataStorage: Send + Sync {
    /// Prepare the backend. Called once at startup.
    async fn init(&self, config: &GatewayConfig) -> Result<(), StorageError>;

    /// Dependency status for the health endpoint (name → status).
    async fn health(&self, config: &GatewayConfig) -> BTreeMap<String, String>;

    /// Fetch the description of `uri` in `format`.
    async fn get_resource(
        &self,
        graph: &str,
        uri: &str,
        format: Format,
        is_authenticated: bool,
    ) -> Result<Option<String>, StorageError>;

    /// Access rights of `uri` (`public`, `internal`, anything else).
    async fn get_access_rights(&self, graph: &str, uri: &str) -> Result<String, StorageError>;

    /// Run a search.
    async fn search_resource(
        &self,
        graph: &str,
        query: &SearchQuery,
        format: Format,
        is_authenticated: bool,
    ) -> Result<Option<String>, StorageError>;

    /// Run a SPARQL query, passed through verbatim.
    async fn sparql_query(
        &self,
        graph: &str,
        query: &str,
        format: Format,
        is_authenticated: bool,
    ) -> Result<Option<String>, StorageError>;

    /// Apply a SPARQL update; returns the backend status code as a string
    /// (`"201"` on success).
    async fn sparql_update(&self, data: &str) -> Result<String, StorageError>;
}

pub use memory::InMemoryStorage;
