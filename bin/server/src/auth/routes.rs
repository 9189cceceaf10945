//! Authentication routes for login, callback, and logout.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cluster_login_platform_access::{LoginError, PendingAuthorization, SessionKey};
use oauth2::CsrfToken;
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{AppState, realm};

/// Session cookie name.
const SESSION_COOKIE: &str = "login_session";

/// Query parameters for the login entry point.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    from: Option<String>,
}

/// Query parameters for the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Initiates the login flow by redirecting to the platform's OAuth provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    // The environment may have changed since the last login; every commence
    // re-resolves against a fresh discovery pass.
    let snapshot = state.realm.refresh().await;

    // The host root, as the browser addressed it, is the fallback target.
    let root = format!(
        "{}://{}/",
        request_scheme(&headers),
        request_host(&headers)?
    );
    let referer = header_str(&headers, header::REFERER);
    let target = realm::redirect_target(query.from.as_deref(), referer, &root);

    // The callback is bound to the target the user will land on, not to
    // whatever address this request happened to arrive at.
    let callback_url = state.realm.callback_url(&target)?;
    let (auth_url, csrf_token) = snapshot.authorization_redirect(&callback_url)?;

    // Reuse the browser's session key when it already has one so a retried
    // login replaces the pending authorization instead of orphaning it.
    let session_key = match jar.get(SESSION_COOKIE) {
        Some(cookie) => SessionKey::new(cookie.value().to_string()),
        None => SessionKey::new(CsrfToken::new_random().secret().clone()),
    };

    state.pending.insert(
        session_key.clone(),
        PendingAuthorization::new(csrf_token.secret().clone(), query.from.clone(), target),
    );

    let cookie = Cookie::build((SESSION_COOKIE, session_key.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.session_config.pending_ttl_minutes));

    Ok((jar.add(cookie), Redirect::to(auth_url.as_str())).into_response())
}

/// Handles the provider callback after the user authorizes.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    if let Some(error) = query.error {
        return Err(AuthError::ProviderDenied(error));
    }

    // A callback without a live pending authorization is a stale session:
    // the browser sat on the provider page past the TTL, or the server
    // restarted. Send the user back to the root to start over.
    let Some(session_cookie) = jar.get(SESSION_COOKIE) else {
        tracing::debug!("callback without a session cookie; treating as stale");
        return Ok(Redirect::to("/").into_response());
    };
    let session_key = SessionKey::new(session_cookie.value().to_string());

    // A request arriving while the session is logging out is the tail end
    // of the logout redirect, not a provider callback.
    if state.pending.take_logging_out(&session_key) {
        tracing::debug!("callback during logout; redirecting to root");
        return Ok(Redirect::to("/").into_response());
    }

    let Some(pending) = state.pending.take(&session_key) else {
        tracing::debug!("callback without a pending authorization; treating as stale");
        return Ok(Redirect::to("/").into_response());
    };

    // The state check gates the token exchange.
    if query.state.as_deref() != Some(pending.state()) {
        return Err(AuthError::Login(LoginError::StateMismatch));
    }
    let code = query.code.ok_or(AuthError::MissingCode)?;

    let snapshot = state.realm.current();
    // Same derivation as the commence step: the exchange must present the
    // redirect_uri that was registered with the authorization request.
    let callback_url = state.realm.callback_url(pending.redirect_on_finish())?;
    let credential = snapshot.exchange_code(&code, &callback_url).await?;

    let identity = snapshot
        .client()
        .current_user(credential.access_token())
        .await
        .map_err(|e| {
            AuthError::Login(LoginError::RoleResolution {
                reason: e.to_string(),
            })
        })?;

    let namespace = snapshot.config().require_namespace()?.to_string();
    let tiers = snapshot
        .client()
        .resolve_tiers(credential.access_token(), &namespace)
        .await
        .map_err(|e| {
            AuthError::Login(LoginError::RoleResolution {
                reason: e.to_string(),
            })
        })?;

    match state
        .synchronizer
        .sync(identity.short_name(), &tiers)
        .await
    {
        Some(principal) => {
            tracing::info!(identity = %principal.matrix_key(), "login complete");
        }
        None => {
            // No recognized tier: the user stays anonymous but still lands
            // on the page they asked for.
            tracing::info!(
                user = identity.short_name(),
                "no privilege tier allowed; not authenticating"
            );
        }
    }

    Ok(Redirect::to(pending.redirect_on_finish()).into_response())
}

/// Logs the user out and redirects past the logout segment.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        let session_key = SessionKey::new(session_cookie.value().to_string());
        state.pending.mark_logging_out(session_key);
    }

    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    let target = realm::post_logout_target(uri.path());
    (jar.add(remove_session), Redirect::to(&target))
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// The request scheme, honoring a proxy's forwarded protocol.
fn request_scheme(headers: &HeaderMap) -> &str {
    match header_str(headers, header::HeaderName::from_static("x-forwarded-proto")) {
        Some("https") => "https",
        _ => "http",
    }
}

fn request_host(headers: &HeaderMap) -> Result<&str, AuthError> {
    header_str(headers, header::HOST).ok_or(AuthError::MissingHost)
}

/// Authentication errors.
#[derive(Debug)]
pub enum AuthError {
    Login(LoginError),
    ProviderDenied(String),
    MissingCode,
    MissingHost,
}

impl From<LoginError> for AuthError {
    fn from(error: LoginError) -> Self {
        Self::Login(error)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Login(LoginError::StateMismatch) => {
                (StatusCode::BAD_REQUEST, "State parameter mismatch")
            }
            Self::Login(LoginError::InvalidRedirectTarget { url }) => {
                tracing::warn!(url = %url, "rejected redirect target");
                (StatusCode::BAD_REQUEST, "Invalid redirect target")
            }
            Self::Login(LoginError::ConfigIncomplete { field }) => {
                tracing::error!(field, "login attempted with incomplete configuration");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication is not configured",
                )
            }
            Self::Login(error) => {
                tracing::error!(error = %error, "login flow failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
            }
            Self::ProviderDenied(error) => {
                tracing::warn!(error = %error, "provider reported an authorization error");
                (StatusCode::FORBIDDEN, "Authorization was denied")
            }
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::MissingHost => (StatusCode::BAD_REQUEST, "Missing Host header"),
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AppState, InMemoryHost, OAuthRealm, ResolvedRealm};
    use crate::config::SessionConfig;
    use cluster_login_cluster_api::ClusterClient;
    use cluster_login_platform_access::{DiscoveredDefaults, PendingStore, RealmSettings};

    fn test_state() -> Arc<AppState> {
        state_with(RealmSettings::default())
    }

    /// Settings resolved enough to commence a login without any discovery;
    /// the credential directory is absent and the API base unroutable, so a
    /// refresh finds nothing and resolution runs on these values alone.
    fn configured_settings() -> RealmSettings {
        RealmSettings {
            credential_dir: Some("/nonexistent/credential-dir".to_string()),
            api_base: Some("https://unused.invalid".to_string()),
            redirect_base: Some("https://platform.example.com".to_string()),
            client_id: Some("system:serviceaccount:ci:login".to_string()),
            client_secret: Some("sa-token".to_string()),
            ..Default::default()
        }
    }

    fn state_with(settings: RealmSettings) -> Arc<AppState> {
        let realm = OAuthRealm::new(
            settings.clone(),
            None,
            ResolvedRealm::resolve(
                &settings,
                &DiscoveredDefaults::default(),
                ClusterClient::from_http(reqwest::Client::new(), "https://unused.invalid"),
            ),
        );
        Arc::new(AppState::new(
            realm,
            PendingStore::new(chrono::Duration::minutes(10)),
            Arc::new(InMemoryHost::new()),
            SessionConfig::default(),
        ))
    }

    fn registered_redirect_uri(response: &Response) -> String {
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("location header");
        let auth_url = url::Url::parse(location.to_str().expect("ascii location"))
            .expect("absolute authorization url");
        auth_url
            .query_pairs()
            .find(|(name, _)| name == "redirect_uri")
            .map(|(_, value)| value.into_owned())
            .expect("redirect_uri parameter")
    }

    fn assert_redirects_to(response: &Response, target: &str) {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("location header");
        assert_eq!(location.to_str().expect("ascii location"), target);
    }

    #[tokio::test]
    async fn registered_callback_follows_the_target_not_the_request_host() {
        let state = state_with(configured_settings());
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "other.example.net".parse().expect("host"));

        let query = LoginQuery {
            from: Some("https://target.example.com/jobs/42".to_string()),
        };
        let response = login(State(state), Query(query), headers, CookieJar::new())
            .await
            .expect("login commences");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            registered_redirect_uri(&response),
            "https://target.example.com/auth/callback"
        );
    }

    #[tokio::test]
    async fn relative_from_binds_the_callback_to_the_request_root() {
        let state = state_with(configured_settings());
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "ci.example.com".parse().expect("host"));

        let query = LoginQuery {
            from: Some("/jobs/42".to_string()),
        };
        let response = login(State(state), Query(query), headers, CookieJar::new())
            .await
            .expect("login commences");

        assert_eq!(
            registered_redirect_uri(&response),
            "http://ci.example.com/auth/callback"
        );
    }

    #[tokio::test]
    async fn stale_callback_redirects_to_root_without_an_exchange() {
        let state = test_state();
        let query = CallbackQuery {
            code: Some("code-1".to_string()),
            state: Some("state-1".to_string()),
            error: None,
        };

        let response = callback(State(state), Query(query), CookieJar::new())
            .await
            .expect("stale callback is not an error");
        assert_redirects_to(&response, "/");
    }

    #[tokio::test]
    async fn tampered_state_is_rejected_before_the_exchange() {
        let state = test_state();
        let session_key = SessionKey::new("session-1".to_string());
        state.pending.insert(
            session_key,
            PendingAuthorization::new("expected".to_string(), None, "/".to_string()),
        );

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "session-1"));
        let query = CallbackQuery {
            code: Some("code-1".to_string()),
            state: Some("tampered".to_string()),
            error: None,
        };

        let result = callback(State(state), Query(query), jar).await;
        assert!(matches!(
            result,
            Err(AuthError::Login(LoginError::StateMismatch))
        ));
    }

    #[tokio::test]
    async fn callback_during_logout_redirects_to_root() {
        let state = test_state();
        let session_key = SessionKey::new("session-1".to_string());
        state.pending.mark_logging_out(session_key);

        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "session-1"));
        let query = CallbackQuery {
            code: None,
            state: None,
            error: None,
        };

        let response = callback(State(state), Query(query), jar)
            .await
            .expect("logout tail is not an error");
        assert_redirects_to(&response, "/");
    }

    #[tokio::test]
    async fn logout_strips_the_logout_segment_and_clears_the_cookie() {
        let state = test_state();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "session-1"));

        let response = logout(State(state.clone()), Uri::from_static("/auth/logout"), jar)
            .await
            .into_response();
        assert_redirects_to(&response, "/auth");
        assert!(state.pending.take_logging_out(&SessionKey::new("session-1".to_string())));
    }

    #[test]
    fn forwarded_proto_controls_the_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", "https".parse().expect("header"));
        assert_eq!(request_scheme(&headers), "https");

        headers.insert("x-forwarded-proto", "gopher".parse().expect("header"));
        assert_eq!(request_scheme(&headers), "http");

        assert_eq!(request_scheme(&HeaderMap::new()), "http");
    }

    #[test]
    fn missing_host_is_rejected() {
        assert!(matches!(
            request_host(&HeaderMap::new()),
            Err(AuthError::MissingHost)
        ));
    }

    #[test]
    fn state_mismatch_maps_to_bad_request() {
        let response = AuthError::Login(LoginError::StateMismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn incomplete_config_is_not_leaked_to_the_client() {
        let response = AuthError::Login(LoginError::ConfigIncomplete {
            field: "client_secret",
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
