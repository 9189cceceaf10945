//! Startup auto-discovery of realm defaults.
//!
//! When the server runs inside a cluster pod, the platform mounts a
//! credential directory holding the pod's namespace, a service-account
//! bearer token, and the cluster's certificate authority. Discovery reads
//! whatever is present, asks the platform who the token acts as, and fills
//! in the defaults that the operator left unset: the account name, the
//! OAuth client id, and the provider's public address.
//!
//! Discovery never fails the startup. Missing pieces are logged and left
//! `None`; configuration resolution reports them only when something
//! actually dereferences the missing value.

use cluster_login_cluster_api::ClusterClient;
use cluster_login_platform_access::{DiscoveredDefaults, RealmSettings};
use std::path::Path;
use tracing::{debug, info, warn};

/// Environment variables the platform injects into every pod.
const SERVICE_HOST_VAR: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT_VAR: &str = "KUBERNETES_SERVICE_PORT";

/// File names inside the credential directory.
const NAMESPACE_FILE: &str = "namespace";
const TOKEN_FILE: &str = "token";
const CA_FILE: &str = "ca.crt";

/// What discovery produced: the defaults and the API client used to probe
/// them, trust-anchored when the credential directory held a certificate.
pub struct DiscoveryOutcome {
    /// Defaults filled from the pod environment and the platform API.
    pub defaults: DiscoveredDefaults,
    /// Client for subsequent platform calls.
    pub client: ClusterClient,
}

/// Whether the server appears to be running inside a cluster pod.
///
/// Either the platform's injected service environment variables or the
/// presence of the credential directory is taken as evidence. Outside a
/// pod, incomplete discovery is expected and logged quietly.
#[must_use]
pub fn within_pod(credential_dir: &Path) -> bool {
    let service_env = std::env::var_os(SERVICE_HOST_VAR).is_some()
        && std::env::var_os(SERVICE_PORT_VAR).is_some();
    service_env || credential_dir.is_dir()
}

/// Probes the pod environment and the platform API for realm defaults.
///
/// A pre-built client may be supplied and takes precedence over any client
/// this function would construct; tests use this to point discovery at a
/// stub transport.
pub async fn discover(
    settings: &RealmSettings,
    injected_client: Option<ClusterClient>,
) -> DiscoveryOutcome {
    let credential_dir = settings.effective_credential_dir().to_string();
    let api_base = settings.effective_api_base().to_string();
    let dir = Path::new(&credential_dir);
    let in_pod = within_pod(dir);

    let mut defaults = DiscoveredDefaults::default();
    defaults.namespace = read_credential(dir, NAMESPACE_FILE, in_pod);
    defaults.bearer_token = read_credential(dir, TOKEN_FILE, in_pod);
    let trust_anchor = read_credential(dir, CA_FILE, in_pod);

    let client = match injected_client {
        Some(client) => client,
        None => build_client(&api_base, trust_anchor.as_deref()),
    };

    if let Some(token) = probe_credential(settings, defaults.bearer_token.as_deref()) {
        probe_platform(&client, &token, &mut defaults, in_pod).await;
    } else if in_pod {
        warn!("no client secret or service-account token found; account name, client id, and provider address cannot be discovered");
    } else {
        debug!("no client secret or service-account token found; skipping platform probe");
    }

    if defaults.is_complete() {
        info!("discovered complete realm defaults");
    }

    DiscoveryOutcome { defaults, client }
}

/// The bearer credential the platform probe authenticates with.
///
/// An explicitly configured client secret wins over the token read from the
/// credential directory, the same precedence the resolved configuration
/// applies. An operator who supplies the secret but runs the server outside
/// a pod still gets the account name and provider address discovered.
fn probe_credential(settings: &RealmSettings, bearer_token: Option<&str>) -> Option<String> {
    settings
        .client_secret
        .clone()
        .or_else(|| bearer_token.map(str::to_string))
}

fn build_client(api_base: &str, trust_anchor: Option<&str>) -> ClusterClient {
    if let Some(pem) = trust_anchor {
        match ClusterClient::with_trust_anchor(api_base, pem.as_bytes()) {
            Ok(client) => return client,
            Err(e) => {
                warn!(error = %e, "failed to load cluster trust anchor; falling back to system trust store");
            }
        }
    }
    match ClusterClient::new(api_base) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to build platform transport; using plain client");
            ClusterClient::from_http(reqwest::Client::new(), api_base)
        }
    }
}

/// Asks the platform who the token acts as and where its OAuth provider
/// lives, filling the account name, client id, and public provider address.
async fn probe_platform(
    client: &ClusterClient,
    token: &str,
    defaults: &mut DiscoveredDefaults,
    in_pod: bool,
) {
    match client.current_user(token).await {
        Ok(identity) => {
            let account = identity.short_name().to_string();
            if let Some(namespace) = &defaults.namespace {
                defaults.client_id = Some(format!("system:serviceaccount:{namespace}:{account}"));
            }
            defaults.account_name = Some(account);
        }
        Err(e) => report(in_pod, "failed to look up the service account identity", &e),
    }

    match client.provider_metadata(token).await {
        Ok(metadata) => {
            defaults.redirect_base = Some(metadata.issuer);
        }
        Err(e) => report(in_pod, "failed to fetch OAuth provider metadata", &e),
    }
}

fn read_credential(dir: &Path, file: &str, in_pod: bool) -> Option<String> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(e) => {
            if in_pod {
                warn!(path = %path.display(), error = %e, "failed to read pod credential");
            } else {
                debug!(path = %path.display(), error = %e, "pod credential not available");
            }
            None
        }
    }
}

fn report(in_pod: bool, message: &str, error: &dyn std::fmt::Display) {
    if in_pod {
        warn!(error = %error, "{message}");
    } else {
        debug!(error = %error, "{message}");
    }
}
