//! The OAuth security realm: resolved configuration plus the provider flow.
//!
//! The realm holds the operator's settings and a published snapshot of the
//! resolved configuration (explicit values over discovered defaults, over
//! built-in constants). Login attempts read whichever snapshot is current;
//! a refresh rebuilds a new snapshot off to the side and publishes it
//! atomically, so an in-flight attempt never observes a half-updated realm.

use cluster_login_cluster_api::ClusterClient;
use cluster_login_platform_access::{
    BearerCredential, DiscoveredDefaults, EffectiveConfig, LoginError, RealmSettings,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};
use url::Url;

use super::discovery;

/// Path the provider redirects back to after the user authorizes.
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Authorization endpoint, relative to the provider's public address.
const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// Token endpoint, relative to the API base.
const TOKEN_PATH: &str = "/oauth/token";

/// Scopes requested from the provider: enough to identify the user and run
/// access reviews on their behalf.
const SCOPES: &[&str] = &["user:info", "user:check-access"];

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// The security realm driving the browser-facing OAuth flow.
pub struct OAuthRealm {
    settings: RealmSettings,
    /// Fixed callback URL override; when set, request scheme and host are
    /// ignored. Used behind fixed external proxies and in tests.
    callback_override: Option<String>,
    resolved: RwLock<Arc<ResolvedRealm>>,
}

impl OAuthRealm {
    /// Creates a realm from operator settings and an initial snapshot.
    pub fn new(
        settings: RealmSettings,
        callback_override: Option<String>,
        initial: ResolvedRealm,
    ) -> Self {
        Self {
            settings,
            callback_override,
            resolved: RwLock::new(Arc::new(initial)),
        }
    }

    /// Returns the currently published snapshot.
    pub fn current(&self) -> Arc<ResolvedRealm> {
        match self.resolved.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publishes a freshly built snapshot.
    pub fn publish(&self, snapshot: ResolvedRealm) {
        let snapshot = Arc::new(snapshot);
        match self.resolved.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Re-runs discovery and publishes a fresh snapshot.
    ///
    /// Called on every commence: the environment may have changed since the
    /// last login (pod recycle, rotated service-account token, new provider
    /// issuer), and the rebuild-then-publish protocol makes the re-probe
    /// safe for in-flight attempts reading the previous snapshot.
    pub async fn refresh(&self) -> Arc<ResolvedRealm> {
        debug!("re-running discovery before commencing login");
        let outcome = discovery::discover(&self.settings, None).await;
        self.publish(ResolvedRealm::resolve(
            &self.settings,
            &outcome.defaults,
            outcome.client,
        ));
        self.current()
    }

    /// Returns the callback URL for a login attempt.
    ///
    /// Derived from the resolved redirect target: its scheme and host are
    /// kept and the fixed callback path appended, so the provider sends the
    /// browser back to the same address the user will end up on. The
    /// override wins when configured.
    pub fn callback_url(&self, redirect_target: &str) -> Result<String, LoginError> {
        if let Some(fixed) = &self.callback_override {
            return Ok(fixed.clone());
        }
        build_callback_url(redirect_target)
    }
}

/// One resolved, immutable realm snapshot.
pub struct ResolvedRealm {
    config: EffectiveConfig,
    client: ClusterClient,
}

impl ResolvedRealm {
    /// Resolves operator settings against discovered defaults.
    #[must_use]
    pub fn resolve(
        settings: &RealmSettings,
        discovered: &DiscoveredDefaults,
        client: ClusterClient,
    ) -> Self {
        Self {
            config: EffectiveConfig::resolve(settings, discovered),
            client,
        }
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Returns the platform API client.
    #[must_use]
    pub fn client(&self) -> &ClusterClient {
        &self.client
    }

    fn oauth_client(&self, callback_url: &str) -> Result<ConfiguredClient, LoginError> {
        let client_id = self.config.require_client_id()?.to_string();
        let client_secret = self.config.require_client_secret()?.to_string();
        let redirect_base = self.config.require_redirect_base()?;

        let auth_url = format!("{}{AUTHORIZE_PATH}", redirect_base.trim_end_matches('/'));
        let token_url = format!(
            "{}{TOKEN_PATH}",
            self.config.api_base().trim_end_matches('/')
        );

        let auth_url = AuthUrl::new(auth_url.clone())
            .map_err(|_| LoginError::InvalidRedirectTarget { url: auth_url })?;
        let token_url = TokenUrl::new(token_url.clone())
            .map_err(|_| LoginError::InvalidRedirectTarget { url: token_url })?;
        let redirect_url = RedirectUrl::new(callback_url.to_string())
            .map_err(|_| LoginError::InvalidRedirectTarget {
                url: callback_url.to_string(),
            })?;

        // The provider expects client credentials in the request body, not
        // in an Authorization header.
        Ok(BasicClient::new(ClientId::new(client_id))
            .set_client_secret(ClientSecret::new(client_secret))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody))
    }

    /// Builds the provider authorization URL and the state to store with
    /// the pending authorization.
    pub fn authorization_redirect(
        &self,
        callback_url: &str,
    ) -> Result<(Url, CsrfToken), LoginError> {
        let client = self.oauth_client(callback_url)?;

        let mut request = client.authorize_url(CsrfToken::new_random);
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }

        let (auth_url, csrf_token) = request.url();
        Ok((auth_url, csrf_token))
    }

    /// Exchanges the authorization code for tokens.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        callback_url: &str,
    ) -> Result<BearerCredential, LoginError> {
        let client = self.oauth_client(callback_url)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(self.client.http())
            .await
            .map_err(|e| LoginError::TokenExchange {
                reason: e.to_string(),
            })?;

        Ok(BearerCredential::new(
            token.access_token().secret().clone(),
            token.refresh_token().map(|t| t.secret().clone()),
            token.expires_in().map(|d| d.as_secs()),
        ))
    }
}

/// Picks the post-login redirect target.
///
/// An explicit `from` parameter wins, then the Referer header, then the
/// host root. Only values that parse as absolute http(s) URLs are admitted;
/// anything else (relative paths included) falls through, which also keeps
/// crafted parameters from steering the callback derivation below.
#[must_use]
pub fn redirect_target(from: Option<&str>, referer: Option<&str>, root: &str) -> String {
    for candidate in [from, referer].into_iter().flatten() {
        if is_absolute_http_url(candidate) {
            return candidate.to_string();
        }
    }
    root.to_string()
}

fn is_absolute_http_url(candidate: &str) -> bool {
    matches!(Url::parse(candidate), Ok(url) if url.scheme() == "http" || url.scheme() == "https")
}

/// Builds the callback URL from the redirect target's scheme and host.
///
/// Only the scheme and host (including any port) survive; the target's path
/// is replaced with the fixed callback path.
fn build_callback_url(redirect_target: &str) -> Result<String, LoginError> {
    let invalid = || LoginError::InvalidRedirectTarget {
        url: redirect_target.to_string(),
    };

    let target = Url::parse(redirect_target).map_err(|_| invalid())?;
    if target.scheme() != "http" && target.scheme() != "https" {
        return Err(invalid());
    }
    let host = target.host_str().ok_or_else(invalid)?;

    let authority = match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!("{}://{authority}{CALLBACK_PATH}", target.scheme()))
}

/// Rewrites the logout request path into the post-logout destination by
/// stripping the trailing logout segment.
#[must_use]
pub fn post_logout_target(path: &str) -> String {
    let stripped = path.trim_end_matches('/').strip_suffix("logout");
    match stripped {
        Some(prefix) if !prefix.trim_end_matches('/').is_empty() => {
            prefix.trim_end_matches('/').to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "http://ci.example.com/";

    #[test]
    fn explicit_from_parameter_wins() {
        let target = redirect_target(
            Some("https://ci.example.com/jobs/42"),
            Some("https://other.example.com/"),
            ROOT,
        );
        assert_eq!(target, "https://ci.example.com/jobs/42");
    }

    #[test]
    fn referer_is_used_when_from_is_absent() {
        let target = redirect_target(None, Some("https://ci.example.com/job/7"), ROOT);
        assert_eq!(target, "https://ci.example.com/job/7");
    }

    #[test]
    fn root_is_the_final_fallback() {
        assert_eq!(redirect_target(None, None, ROOT), ROOT);
    }

    #[test]
    fn non_absolute_targets_fall_through() {
        assert_eq!(redirect_target(Some("/jobs/42"), None, ROOT), ROOT);
        assert_eq!(redirect_target(Some("javascript:alert(1)"), None, ROOT), ROOT);
        assert_eq!(redirect_target(Some("//evil.example.com"), None, ROOT), ROOT);
        assert_eq!(
            redirect_target(Some(""), Some("https://ci.example.com/job/1"), ROOT),
            "https://ci.example.com/job/1"
        );
    }

    #[test]
    fn callback_url_keeps_the_targets_scheme_and_host() {
        let url =
            build_callback_url("https://ci.example.com:8443/job/7/console").expect("callback url");
        assert_eq!(url, "https://ci.example.com:8443/auth/callback");

        let url = build_callback_url("http://ci.example.com/").expect("callback url");
        assert_eq!(url, "http://ci.example.com/auth/callback");
    }

    #[test]
    fn callback_url_rejects_non_http_targets() {
        assert!(build_callback_url("ftp://ci.example.com/drop").is_err());
        assert!(build_callback_url("/jobs/42").is_err());
        assert!(build_callback_url("").is_err());
    }

    #[test]
    fn callback_override_wins_over_the_target() {
        let settings = RealmSettings::default();
        let realm = OAuthRealm::new(
            settings.clone(),
            Some("https://public.example.com/auth/callback".to_string()),
            ResolvedRealm::resolve(
                &settings,
                &DiscoveredDefaults::default(),
                ClusterClient::from_http(reqwest::Client::new(), "https://unused.invalid"),
            ),
        );
        assert_eq!(
            realm
                .callback_url("http://internal:3000/jobs/1")
                .expect("url"),
            "https://public.example.com/auth/callback"
        );
    }

    #[tokio::test]
    async fn refresh_reprobes_even_after_complete_discovery() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("namespace"), "recycled-ns").expect("write");

        let settings = RealmSettings {
            credential_dir: Some(dir.path().display().to_string()),
            ..Default::default()
        };
        let complete = DiscoveredDefaults {
            namespace: Some("old-ns".to_string()),
            bearer_token: Some("old-token".to_string()),
            account_name: Some("login".to_string()),
            client_id: Some("system:serviceaccount:old-ns:login".to_string()),
            redirect_base: Some("https://platform.example.com".to_string()),
        };
        let realm = OAuthRealm::new(
            settings.clone(),
            None,
            ResolvedRealm::resolve(
                &settings,
                &complete,
                ClusterClient::from_http(reqwest::Client::new(), "https://unused.invalid"),
            ),
        );
        assert!(realm.current().config().fully_discovered());

        let snapshot = realm.refresh().await;
        assert_eq!(snapshot.config().namespace(), Some("recycled-ns"));
    }

    #[test]
    fn post_logout_strips_the_logout_segment() {
        assert_eq!(post_logout_target("/auth/logout"), "/auth");
        assert_eq!(post_logout_target("/logout"), "/");
        assert_eq!(post_logout_target("/jobs"), "/");
    }

    #[test]
    fn authorization_redirect_requires_resolved_config() {
        let settings = RealmSettings::default();
        let resolved = ResolvedRealm::resolve(
            &settings,
            &DiscoveredDefaults::default(),
            ClusterClient::from_http(reqwest::Client::new(), "https://unused.invalid"),
        );
        let result = resolved.authorization_redirect("https://ci.example.com/auth/callback");
        assert!(matches!(
            result,
            Err(LoginError::ConfigIncomplete { field: "client_id" })
        ));
    }

    #[test]
    fn authorization_redirect_carries_state_and_scopes() {
        let settings = RealmSettings {
            client_id: Some("system:serviceaccount:ci:login".to_string()),
            client_secret: Some("sa-token".to_string()),
            redirect_base: Some("https://platform.example.com".to_string()),
            ..Default::default()
        };
        let resolved = ResolvedRealm::resolve(
            &settings,
            &DiscoveredDefaults::default(),
            ClusterClient::from_http(reqwest::Client::new(), "https://unused.invalid"),
        );

        let (url, state) = resolved
            .authorization_redirect("https://ci.example.com/auth/callback")
            .expect("authorization redirect");

        assert!(url.as_str().starts_with("https://platform.example.com/oauth/authorize"));
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(query.iter().any(|(k, v)| k == "state" && v == state.secret()));
        assert!(
            query
                .iter()
                .any(|(k, v)| k == "scope" && v.contains("user:info"))
        );
        assert!(
            query
                .iter()
                .any(|(k, v)| k == "redirect_uri" && v == "https://ci.example.com/auth/callback")
        );
    }
}
