//! Static token authorization.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{AuthError, Authorization};
use crate::config::{GatewayConfig, StaticToken};

/// Authorization backend backed by a fixed token table.
///
/// A token may be bound to a patron; bound tokens are only valid for that
/// patron, unbound tokens for anyone. Every resource class is granted.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthorization {
    tokens: BTreeMap<String, Option<String>>,
}

impl StaticTokenAuthorization {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from configured tokens.
    pub fn from_tokens(tokens: &[StaticToken]) -> Self {
        let mut auth = Self::new();
        for t in tokens {
            auth.add_token(t.token.clone(), t.patron.clone());
        }
        auth
    }

    /// Register a token, optionally bound to a patron.
    pub fn add_token(&mut self, token: impl Into<String>, patron: Option<String>) {
        self.tokens.insert(token.into(), patron);
    }

    /// Number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens are registered.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl Authorization for StaticTokenAuthorization {
    async fn init(&self, _config: &GatewayConfig) -> Result<(), AuthError> {
        tracing::debug!(token_count = self.tokens.len(), "Static token authorization initialized");
        Ok(())
    }

    async fn health(&self, _config: &GatewayConfig) -> BTreeMap<String, String> {
        BTreeMap::from([("authorization".to_string(), "ok".to_string())])
    }

    async fn is_token_valid(
        &self,
        _resource_class: &str,
        patron_id: &str,
        token: &str,
    ) -> Result<bool, AuthError> {
        Ok(match self.tokens.get(token) {
            Some(Some(bound)) => bound == patron_id,
            Some(None) => true,
            None => false,
        })
    }
}
