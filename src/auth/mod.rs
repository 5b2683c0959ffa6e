//! Authorization backends.
//!
//! The gateway never validates tokens itself; it asks an [`Authorization`]
//! backend whether a token grants access to a resource class.

pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::GatewayConfig;

/// Error type for authorization operations.
///
/// Never fatal to a request: the caller continues as anonymous.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The authorization service could not be reached.
    #[error("authorization service unreachable: {0}")]
    Unreachable(String),
    /// The authorization service answered with an error.
    #[error("authorization check failed: {0}")]
    Check(String),
}

/// Trait for authorization backends.
#[async_trait]
pub trait Authorization: Send + Sync {
    /// Prepare the backend. Called once at startup.
    async fn init(&self, config: &GatewayConfig) -> Result<(), AuthError>;

    /// Dependency status for the health endpoint (name → status).
    async fn health(&self, config: &GatewayConfig) -> BTreeMap<String, String>;

    /// Whether `token` grants `patron_id` access to `resource_class`.
    ///
    /// `patron_id` is empty when the token came from the `Authorization`
    /// header rather than the session cookie.
    async fn is_token_valid(
        &self,
        resource_class: &str,
        patron_id: &str,
        token: &str,
    ) -> Result<bool, AuthError>;
}

pub use memory::StaticTokenAuthorization;
