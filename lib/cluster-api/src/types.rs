//! Wire types for the cluster platform API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider metadata from the platform's OAuth discovery document.
///
/// Served at `/.well-known/oauth-authorization-server`. The issuer is the
/// public address of the authorization server, which is what the browser
/// must be redirected to; the API base the realm talks to may only be
/// reachable from inside the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    /// Public issuer URL.
    pub issuer: String,
    /// Authorization endpoint the browser is sent to.
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint for the code exchange.
    #[serde(default)]
    pub token_endpoint: Option<String>,
}

impl fmt::Display for ProviderMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "issuer {}", self.issuer)
    }
}

/// The acting identity reported by the platform's `/users/~` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserIdentity {
    /// Fully qualified name, either a plain username or a 4-part
    /// colon-delimited service-account identifier.
    pub name: String,
}

impl UserIdentity {
    /// Returns the short account name.
    ///
    /// A 4-part identifier such as `system:serviceaccount:ci:builder`
    /// yields its last segment; anything else is returned as-is.
    #[must_use]
    pub fn short_name(&self) -> &str {
        let parts: Vec<&str> = self.name.split(':').collect();
        if parts.len() == 4 { parts[3] } else { &self.name }
    }
}

/// Body of a subject access review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessReviewRequest {
    /// Namespace the verb is checked against.
    pub namespace: String,
    /// Verb to check, one tier's verb per request.
    pub verb: String,
}

/// Result of a subject access review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessReviewResponse {
    /// Namespace the check applied to.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether the principal may perform the verb.
    #[serde(default)]
    pub allowed: bool,
    /// Human-readable explanation from the platform.
    #[serde(default)]
    pub reason: Option<String>,
}
