//! In-memory linked data storage for testing and local runs.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{LinkedDataStorage, StorageError};
use crate::config::GatewayConfig;
use crate::types::{Format, SearchQuery};

type Key = (String, String);

/// In-memory storage backend.
///
/// Holds documents per (graph, uri, format), access rights per (graph, uri),
/// canned search and SPARQL answers, and records every update it receives.
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug)]
pub struct InMemoryStorage {
    documents: RwLock<BTreeMap<Key, BTreeMap<Format, String>>>,
    rights: RwLock<BTreeMap<Key, String>>,
    search_results: RwLock<BTreeMap<Key, String>>,
    sparql_results: RwLock<BTreeMap<Key, String>>,
    updates: Mutex<Vec<String>>,
    update_status: RwLock<String>,
    failure: RwLock<Option<StorageError>>,
    fetches: AtomicUsize,
    initialized: AtomicBool,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            rights: RwLock::new(BTreeMap::new()),
            search_results: RwLock::new(BTreeMap::new()),
            sparql_results: RwLock::new(BTreeMap::new()),
            updates: Mutex::new(Vec::new()),
            update_status: RwLock::new("201".to_string()),
            failure: RwLock::new(None),
            fetches: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
        }
    }
}

impl InMemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the description of `uri` in `format`.
    pub fn add_document(&self, graph: &str, uri: &str, format: Format, body: impl Into<String>) {
        self.documents
            .write()
            .entry(key(graph, uri))
            .or_default()
            .insert(format, body.into());
    }

    /// Set the access rights of `uri`. Unset rights read as `""`.
    pub fn set_access_rights(&self, graph: &str, uri: &str, rights: impl Into<String>) {
        self.rights.write().insert(key(graph, uri), rights.into());
    }

    /// Answer searches for `q` in `graph` with `body`.
    pub fn set_search_result(&self, graph: &str, q: &str, body: impl Into<String>) {
        self.search_results.write().insert(key(graph, q), body.into());
    }

    /// Answer the SPARQL `query` in `graph` with `body`.
    pub fn set_sparql_result(&self, graph: &str, query: &str, body: impl Into<String>) {
        self.sparql_results.write().insert(key(graph, query), body.into());
    }

    /// Status string returned by `sparql_update` (default `"201"`).
    pub fn set_update_status(&self, status: impl Into<String>) {
        *self.update_status.write() = status.into();
    }

    /// Make every subsequent operation fail with `error`.
    pub fn fail_with(&self, error: StorageError) {
        *self.failure.write() = Some(error);
    }

    /// Number of `get_resource` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Update payloads received so far, oldest first.
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }

    /// Load the configured seed documents. Returns how many were stored.
    pub fn seed(&self, config: &GatewayConfig) -> usize {
        let mut stored = 0;
        for doc in &config.storage.documents {
            let Some(format) = Format::from_token(&doc.format) else {
                tracing::warn!(uri = %doc.uri, format = %doc.format, "Skipping seed document with unknown format");
                continue;
            };
            let graph = doc.graph.as_deref().unwrap_or(config.storage.graph_default.as_str());
            self.add_document(graph, &doc.uri, format, doc.body.as_str());
            if let Some(rights) = &doc.rights {
                self.set_access_rights(graph, &doc.uri, rights.as_str());
            }
            stored += 1;
        }
        stored
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        match self.failure.read().as_ref() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn key(graph: &str, id: &str) -> Key {
    (graph.to_string(), id.to_string())
}

#[async_trait]
impl LinkedDataStorage for InMemoryStorage {
    async fn init(&self, config: &GatewayConfig) -> Result<(), StorageError> {
        self.check_failure()?;
        let seeded = self.seed(config);
        tracing::debug!(graphs = ?config.storage.graphs, seeded, "In-memory storage initialized");
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self, _config: &GatewayConfig) -> BTreeMap<String, String> {
        let status = if self.failure.read().is_some() { "failed" } else { "ok" };
        BTreeMap::from([("storage".to_string(), status.to_string())])
    }

    async fn get_resource(
        &self,
        graph: &str,
        uri: &str,
        format: Format,
        _is_authenticated: bool,
    ) -> Result<Option<String>, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self
            .documents
            .read()
            .get(&key(graph, uri))
            .and_then(|by_format| by_format.get(&format).cloned()))
    }

    async fn get_access_rights(&self, graph: &str, uri: &str) -> Result<String, StorageError> {
        self.check_failure()?;
        Ok(self.rights.read().get(&key(graph, uri)).cloned().unwrap_or_default())
    }

    async fn search_resource(
        &self,
        graph: &str,
        query: &SearchQuery,
        _format: Format,
        _is_authenticated: bool,
    ) -> Result<Option<String>, StorageError> {
        self.check_failure()?;
        Ok(self.search_results.read().get(&key(graph, &query.q)).cloned())
    }

    async fn sparql_query(
        &self,
        graph: &str,
        query: &str,
        _format: Format,
        _is_authenticated: bool,
    ) -> Result<Option<String>, StorageError> {
        self.check_failure()?;
        Ok(self.sparql_results.read().get(&key(graph, query)).cloned())
    }

    async fn sparql_update(&self, data: &str) -> Result<String, StorageError> {
        self.check_failure()?;
        self.updates.lock().push(data.to_string());
        Ok(self.update_status.read().clone())
    }
}
