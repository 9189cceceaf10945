//! Realm configuration and the explicit-else-discovered resolution chain.
//!
//! Every field an operator can set is optional. Values not set explicitly
//! fall back to defaults auto-discovered from the managed runtime
//! environment (see the server's discovery module). Resolution itself is a
//! pure function so it can be tested without touching the process
//! environment; missing fields only fail when a downstream component
//! actually dereferences them.

use serde::{Deserialize, Serialize};

use crate::error::LoginError;

/// Conventional mount point for the platform's service-account credentials.
pub const DEFAULT_CREDENTIAL_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// In-cluster address of the platform API server.
pub const DEFAULT_API_BASE: &str = "https://kubernetes.default.svc";

/// Explicit realm configuration, as supplied by the operator.
///
/// Loaded from the environment by the server; every field may be omitted.
/// Empty strings count as unset, matching what form-driven configuration
/// tends to deliver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmSettings {
    /// Directory holding the service-account `namespace`, `token`, and
    /// `ca.crt` files.
    #[serde(default)]
    pub credential_dir: Option<String>,
    /// Service-account name used to derive the OAuth client id.
    #[serde(default)]
    pub account_name: Option<String>,
    /// Base URL of the platform API server for server-side calls.
    #[serde(default)]
    pub api_base: Option<String>,
    /// Base URL the browser is redirected to for authorization.
    #[serde(default)]
    pub redirect_base: Option<String>,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
}

fn fix_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RealmSettings {
    /// Returns a copy with empty-string fields treated as unset.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            credential_dir: fix_empty(self.credential_dir),
            account_name: fix_empty(self.account_name),
            api_base: fix_empty(self.api_base),
            redirect_base: fix_empty(self.redirect_base),
            client_id: fix_empty(self.client_id),
            client_secret: fix_empty(self.client_secret),
        }
    }

    /// The credential directory to probe: explicit value or the well-known
    /// default mount point.
    #[must_use]
    pub fn effective_credential_dir(&self) -> &str {
        self.credential_dir.as_deref().unwrap_or(DEFAULT_CREDENTIAL_DIR)
    }

    /// The API base to use for server-side calls: explicit value or the
    /// in-cluster default.
    #[must_use]
    pub fn effective_api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }
}

/// Defaults derived from the managed environment by one discovery pass.
///
/// Any field may be absent; a partial probe degrades gracefully and explicit
/// configuration still applies.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDefaults {
    /// Namespace read from the credential directory.
    pub namespace: Option<String>,
    /// Service-account bearer token read from the credential directory.
    /// Doubles as the default OAuth client secret.
    pub bearer_token: Option<String>,
    /// Account name derived from the platform's identity endpoint.
    pub account_name: Option<String>,
    /// Client id derived as `system:serviceaccount:<namespace>:<name>`.
    pub client_id: Option<String>,
    /// Issuer URL from provider discovery; the browser-facing redirect base.
    pub redirect_base: Option<String>,
}

impl DiscoveredDefaults {
    /// Returns true if the probe obtained everything auto-discovery can
    /// provide.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.namespace.is_some()
            && self.bearer_token.is_some()
            && self.account_name.is_some()
            && self.client_id.is_some()
            && self.redirect_base.is_some()
    }
}

/// The effective configuration snapshot for one login attempt.
///
/// Immutable once resolved. Fields that may legitimately still be absent are
/// exposed through `require_*` accessors that surface
/// [`LoginError::ConfigIncomplete`] at dereference time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    credential_dir: String,
    api_base: String,
    account_name: Option<String>,
    redirect_base: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    namespace: Option<String>,
    fully_discovered: bool,
}

impl EffectiveConfig {
    /// Resolves explicit settings against discovered defaults.
    ///
    /// Each field is `explicit.or(discovered)`; the credential directory and
    /// API base additionally fall back to well-known constants. The
    /// `fully_discovered` flag records whether this process could run on
    /// auto-discovery alone with no required field left unset.
    #[must_use]
    pub fn resolve(settings: &RealmSettings, discovered: &DiscoveredDefaults) -> Self {
        let account_name = settings
            .account_name
            .clone()
            .or_else(|| discovered.account_name.clone());
        let redirect_base = settings
            .redirect_base
            .clone()
            .or_else(|| discovered.redirect_base.clone());
        let client_id = settings
            .client_id
            .clone()
            .or_else(|| discovered.client_id.clone());
        let client_secret = settings
            .client_secret
            .clone()
            .or_else(|| discovered.bearer_token.clone());
        let namespace = discovered.namespace.clone();

        let nothing_missing = namespace.is_some()
            && account_name.is_some()
            && redirect_base.is_some()
            && client_id.is_some()
            && client_secret.is_some();
        let fully_discovered = discovered.is_complete() && nothing_missing;

        Self {
            credential_dir: settings.effective_credential_dir().to_string(),
            api_base: settings.effective_api_base().to_string(),
            account_name,
            redirect_base,
            client_id,
            client_secret,
            namespace,
            fully_discovered,
        }
    }

    /// The credential directory in effect.
    #[must_use]
    pub fn credential_dir(&self) -> &str {
        &self.credential_dir
    }

    /// The API base in effect. Always present; defaults to the in-cluster
    /// address.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The redirect base, failing if neither configured nor discovered.
    pub fn require_redirect_base(&self) -> Result<&str, LoginError> {
        self.redirect_base
            .as_deref()
            .ok_or(LoginError::ConfigIncomplete {
                field: "redirect_base",
            })
    }

    /// The client id, failing if neither configured nor discovered.
    pub fn require_client_id(&self) -> Result<&str, LoginError> {
        self.client_id
            .as_deref()
            .ok_or(LoginError::ConfigIncomplete { field: "client_id" })
    }

    /// The client secret, failing if neither configured nor discovered.
    pub fn require_client_secret(&self) -> Result<&str, LoginError> {
        self.client_secret
            .as_deref()
            .ok_or(LoginError::ConfigIncomplete {
                field: "client_secret",
            })
    }

    /// The namespace, failing if discovery never found one.
    pub fn require_namespace(&self) -> Result<&str, LoginError> {
        self.namespace
            .as_deref()
            .ok_or(LoginError::ConfigIncomplete { field: "namespace" })
    }

    /// The account name, if known.
    #[must_use]
    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    /// The namespace, if known.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether the realm could run on auto-discovered values alone.
    #[must_use]
    pub fn fully_discovered(&self) -> bool {
        self.fully_discovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_discovery() -> DiscoveredDefaults {
        DiscoveredDefaults {
            namespace: Some("ci".to_string()),
            bearer_token: Some("sa-token".to_string()),
            account_name: Some("builder".to_string()),
            client_id: Some("system:serviceaccount:ci:builder".to_string()),
            redirect_base: Some("https://platform.example.com".to_string()),
        }
    }

    #[test]
    fn explicit_values_win_over_discovered() {
        let settings = RealmSettings {
            client_id: Some("custom-client".to_string()),
            redirect_base: Some("https://public.example.com".to_string()),
            ..Default::default()
        };
        let config = EffectiveConfig::resolve(&settings, &full_discovery());

        assert_eq!(config.require_client_id().unwrap(), "custom-client");
        assert_eq!(
            config.require_redirect_base().unwrap(),
            "https://public.example.com"
        );
        // Untouched fields still come from discovery.
        assert_eq!(config.require_client_secret().unwrap(), "sa-token");
        assert_eq!(config.require_namespace().unwrap(), "ci");
    }

    #[test]
    fn constants_apply_when_both_sides_absent() {
        let config =
            EffectiveConfig::resolve(&RealmSettings::default(), &DiscoveredDefaults::default());
        assert_eq!(config.credential_dir(), DEFAULT_CREDENTIAL_DIR);
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn missing_field_fails_only_on_dereference() {
        let config =
            EffectiveConfig::resolve(&RealmSettings::default(), &DiscoveredDefaults::default());
        // Resolution itself never fails...
        assert!(!config.fully_discovered());
        // ...dereferencing the missing field does.
        assert_eq!(
            config.require_client_secret(),
            Err(LoginError::ConfigIncomplete {
                field: "client_secret"
            })
        );
    }

    #[test]
    fn fully_discovered_requires_complete_probe() {
        let settings = RealmSettings::default();
        assert!(EffectiveConfig::resolve(&settings, &full_discovery()).fully_discovered());

        let mut partial = full_discovery();
        partial.redirect_base = None;
        assert!(!EffectiveConfig::resolve(&settings, &partial).fully_discovered());
    }

    #[test]
    fn explicit_override_does_not_mask_incomplete_discovery() {
        // Discovery missed the redirect base but the operator supplied one:
        // the realm works, yet it is not running on full auto-discovery.
        let settings = RealmSettings {
            redirect_base: Some("https://public.example.com".to_string()),
            ..Default::default()
        };
        let mut partial = full_discovery();
        partial.redirect_base = None;

        let config = EffectiveConfig::resolve(&settings, &partial);
        assert!(config.require_redirect_base().is_ok());
        assert!(!config.fully_discovered());
    }

    #[test]
    fn normalized_drops_empty_strings() {
        let settings = RealmSettings {
            client_id: Some(String::new()),
            api_base: Some("  ".to_string()),
            account_name: Some("builder".to_string()),
            ..Default::default()
        }
        .normalized();

        assert!(settings.client_id.is_none());
        assert!(settings.api_base.is_none());
        assert_eq!(settings.account_name.as_deref(), Some("builder"));
    }
}
