//! Caller identity.
//!
//! A bearer credential comes from the `Authorization` header or, failing
//! that, from the session cookie written by the login service. The gateway
//! only asks the [`Authorization`] backend whether the token is valid.

use http::header::AUTHORIZATION;
use http::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::auth::Authorization;
use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::types::Identity;

/// Session cookie payload: URL-encoded JSON.
///
/// Login services disagree on field shapes: `null` stands for an absent
/// value and the lifetime may arrive as a number or a numeric string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionCookie {
    /// Bearer token.
    #[serde(deserialize_with = "null_as_empty")]
    pub access_token: String,
    /// Patron the token was issued to.
    pub patron: Option<String>,
    /// Usually `Bearer`.
    pub token_type: Option<String>,
    /// Granted scopes.
    pub scope: Option<String>,
    /// Lifetime in seconds.
    #[serde(deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Seconds as a number or a numeric string. Anything else reads as unset.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl SessionCookie {
    /// Decode a raw cookie value.
    ///
    /// `+` is read as a space before percent-decoding, as form encoders
    /// write it.
    pub fn decode(raw: &str) -> Result<Self, GatewayError> {
        let spaced = raw.replace('+', " ");
        let decoded = percent_encoding::percent_decode_str(&spaced)
            .decode_utf8()
            .map_err(|e| GatewayError::MalformedSession(e.to_string()))?;
        serde_json::from_str(&decoded).map_err(|e| GatewayError::MalformedSession(e.to_string()))
    }
}

/// Where a credential was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw `Authorization` header value.
    Header(String),
    /// Decoded session cookie.
    Session(SessionCookie),
}

impl Credential {
    /// Token to validate.
    pub fn token(&self) -> &str {
        match self {
            Credential::Header(token) => token,
            Credential::Session(cookie) => &cookie.access_token,
        }
    }

    /// Patron to validate against; empty for header tokens.
    pub fn patron_id(&self) -> &str {
        match self {
            Credential::Header(_) => "",
            Credential::Session(cookie) => cookie.patron.as_deref().unwrap_or_default(),
        }
    }
}

/// Find the caller's credential.
///
/// A non-empty `Authorization` header wins over the session cookie. A
/// cookie that is present but undecodable is an error, not anonymity.
pub fn extract_credential(
    headers: &HeaderMap,
    cookies: &BTreeMap<String, String>,
    cookie_name: &str,
) -> Result<Option<Credential>, GatewayError> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Ok(Some(Credential::Header(token.to_string())));
    }

    match cookies.get(cookie_name) {
        Some(raw) => SessionCookie::decode(raw).map(|c| Some(Credential::Session(c))),
        None => Ok(None),
    }
}

/// Establish the caller identity.
///
/// Backend failures and a missing backend are logged and leave the caller
/// unauthenticated; only a malformed session cookie fails the request.
pub async fn extract_identity(
    headers: &HeaderMap,
    cookies: &BTreeMap<String, String>,
    authorization: Option<&dyn Authorization>,
    settings: &AuthConfig,
) -> Result<Identity, GatewayError> {
    let credential = match extract_credential(headers, cookies, &settings.session_cookie)? {
        Some(c) if !c.token().is_empty() => c,
        _ => return Ok(Identity::anonymous()),
    };

    let token = credential.token().to_string();
    let patron = Some(credential.patron_id())
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let Some(backend) = authorization else {
        tracing::error!("Token presented but no authorization backend is configured");
        return Ok(Identity::unverified(token, patron));
    };

    match backend
        .is_token_valid(&settings.resource_class, credential.patron_id(), &token)
        .await
    {
        Ok(true) => {
            tracing::debug!(patron = ?patron, "Token accepted");
            Ok(Identity::authenticated(token, patron))
        }
        Ok(false) => {
            tracing::debug!(patron = ?patron, "Token rejected");
            Ok(Identity::unverified(token, patron))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Authorization check failed, continuing unauthenticated");
            Ok(Identity::unverified(token, patron))
        }
    }
}
