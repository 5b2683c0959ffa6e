//! Access decision types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Network tier a caller was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkTier {
    /// Inside the institution network, outside the library network.
    InstitutionInternal,
    /// Inside the library network.
    LibraryInternal,
    /// Anywhere else.
    External,
}

impl fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstitutionInternal => write!(f, "institution-internal"),
            Self::LibraryInternal => write!(f, "library-internal"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Per-tier classification of the caller's forwarded-for chain.
///
/// Both tiers are computed independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOrigin {
    /// Caller is inside the institution ranges.
    pub institution_internal: bool,
    /// Caller is inside the library ranges.
    pub library_internal: bool,
}

impl NetworkOrigin {
    /// Collapse the two flags into a single tier, library first.
    pub fn tier(&self) -> NetworkTier {
        if self.library_internal {
            NetworkTier::LibraryInternal
        } else if self.institution_internal {
            NetworkTier::InstitutionInternal
        } else {
            NetworkTier::External
        }
    }
}

/// Caller identity as established by the identity extractor.
///
/// `is_authenticated` can only be set inside this crate, after the
/// authorization backend accepted a non-empty token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    token: Option<String>,
    patron_id: Option<String>,
    is_authenticated: bool,
}

impl Identity {
    /// Caller presented no credential.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Caller presented a credential that was not (or could not be) validated.
    pub fn unverified(token: impl Into<String>, patron_id: Option<String>) -> Self {
        Self {
            token: Some(token.into()),
            patron_id,
            is_authenticated: false,
        }
    }

    pub(crate) fn authenticated(token: String, patron_id: Option<String>) -> Self {
        Self {
            token: Some(token),
            patron_id,
            is_authenticated: true,
        }
    }

    /// The bearer token, if one was presented.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The patron identifier carried by the session cookie.
    pub fn patron_id(&self) -> Option<&str> {
        self.patron_id.as_deref()
    }

    /// Whether the authorization backend accepted the token.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }
}

/// Access rights the storage backend reports for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessRights {
    /// Anyone may read.
    Public,
    /// Library-internal callers and authenticated callers may read.
    Internal,
    /// Any other value, including unset: authenticated callers only.
    Restricted(String),
}

impl AccessRights {
    /// Parse the backend's string value. Never fails; unknown values restrict.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "public" => Self::Public,
            "internal" => Self::Internal,
            other => Self::Restricted(other.to_string()),
        }
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Internal => write!(f, "internal"),
            Self::Restricted(v) if v.is_empty() => write!(f, "<unset>"),
            Self::Restricted(v) => write!(f, "{}", v),
        }
    }
}

/// Everything the route handlers need to gate a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessDecision {
    /// Network classification.
    pub network: NetworkOrigin,
    /// Caller identity.
    pub identity: Identity,
}

impl AccessDecision {
    /// Combine a network classification and an identity.
    pub fn new(network: NetworkOrigin, identity: Identity) -> Self {
        Self { network, identity }
    }

    /// Collapsed network tier.
    pub fn network_tier(&self) -> NetworkTier {
        self.network.tier()
    }

    /// Shorthand for `identity.is_authenticated()`.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    /// Default-deny read policy: only `public` is open to everyone.
    pub fn permits(&self, rights: &AccessRights) -> bool {
        match rights {
            AccessRights::Public => true,
            AccessRights::Internal => self.network.library_internal || self.is_authenticated(),
            AccessRights::Restricted(_) => self.is_authenticated(),
        }
    }
}
