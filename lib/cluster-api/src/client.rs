//! Client for the cluster platform's REST API.

use crate::error::ClusterApiError;
use crate::types::{AccessReviewRequest, AccessReviewResponse, ProviderMetadata, UserIdentity};
use cluster_login_core::Result;
use cluster_login_platform_access::{PrivilegeTier, TierSet};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// OAuth provider discovery document, relative to the API base.
const PROVIDER_PATH: &str = "/.well-known/oauth-authorization-server";

/// The acting identity, relative to the API base.
const USER_PATH: &str = "/users/~";

/// Subject access reviews, relative to the API base.
const REVIEW_PATH: &str = "/subjectaccessreviews";

/// HTTP client for the platform API.
///
/// Calls are bearer-authenticated per request; the client itself only
/// carries the transport (optionally trusting a cluster-issued certificate)
/// and the API base URL. Rebuilt wholesale whenever configuration is
/// re-resolved, never mutated in place.
#[derive(Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    api_base: String,
}

impl ClusterClient {
    /// Creates a client using the default system trust store.
    pub fn new(api_base: impl Into<String>) -> Result<Self, ClusterApiError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ClusterApiError::ConnectionFailed {
                details: e.to_string(),
            })?;
        Ok(Self::from_http(http, api_base))
    }

    /// Creates a client that additionally trusts a PEM certificate, as read
    /// from the credential directory's `ca.crt`.
    pub fn with_trust_anchor(
        api_base: impl Into<String>,
        pem: &[u8],
    ) -> Result<Self, ClusterApiError> {
        let certificate = reqwest::Certificate::from_pem(pem).map_err(|e| {
            ClusterApiError::InvalidTrustAnchor {
                details: e.to_string(),
            }
        })?;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| ClusterApiError::ConnectionFailed {
                details: e.to_string(),
            })?;
        Ok(Self::from_http(http, api_base))
    }

    /// Wraps an existing transport. Used to inject a test transport, which
    /// takes precedence over any trust-anchor construction.
    #[must_use]
    pub fn from_http(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self { http, api_base }
    }

    /// Returns the underlying transport, shared with the token exchange.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ClusterApiError> {
        let endpoint = format!("{}{}", self.api_base, path);
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClusterApiError::ConnectionFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterApiError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            }
            .into());
        }

        response
            .json()
            .await
            .map_err(|e| ClusterApiError::RequestFailed {
                details: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Fetches the platform's OAuth provider metadata.
    #[instrument(skip(self, token))]
    pub async fn provider_metadata(
        &self,
        token: &str,
    ) -> Result<ProviderMetadata, ClusterApiError> {
        let metadata: ProviderMetadata = self.get_json(PROVIDER_PATH, token).await?;
        debug!(issuer = %metadata.issuer, "fetched provider metadata");
        Ok(metadata)
    }

    /// Looks up the identity the bearer token acts as.
    #[instrument(skip(self, token))]
    pub async fn current_user(&self, token: &str) -> Result<UserIdentity, ClusterApiError> {
        let identity: UserIdentity = self.get_json(USER_PATH, token).await?;
        debug!(name = %identity.name, "fetched acting identity");
        Ok(identity)
    }

    /// Runs one access review for a namespace and verb.
    #[instrument(skip(self, token), fields(namespace = %namespace, verb = %verb))]
    pub async fn access_review(
        &self,
        token: &str,
        namespace: &str,
        verb: &str,
    ) -> Result<AccessReviewResponse, ClusterApiError> {
        let endpoint = format!("{}{}", self.api_base, REVIEW_PATH);
        let body = AccessReviewRequest {
            namespace: namespace.to_string(),
            verb: verb.to_string(),
        };

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClusterApiError::ConnectionFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterApiError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            }
            .into());
        }

        let review: AccessReviewResponse =
            response
                .json()
                .await
                .map_err(|e| ClusterApiError::RequestFailed {
                    details: e.to_string(),
                })?;
        debug!(allowed = review.allowed, reason = ?review.reason, "access review result");
        Ok(review)
    }

    /// Resolves the tiers the token's principal holds in a namespace.
    ///
    /// One review per tier, in ascending order; the checks are independent
    /// on the wire. An empty result means the principal holds no recognized
    /// role and must not be authenticated.
    #[instrument(skip(self, token), fields(namespace = %namespace))]
    pub async fn resolve_tiers(
        &self,
        token: &str,
        namespace: &str,
    ) -> Result<TierSet, ClusterApiError> {
        let mut tiers = TierSet::none();
        for tier in PrivilegeTier::ALL {
            let review = self.access_review(token, namespace, tier.verb()).await?;
            if review.allowed {
                tiers.insert(tier);
            }
        }
        debug!(count = tiers.tiers().len(), "resolved privilege tiers");
        Ok(tiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let client = ClusterClient::from_http(
            reqwest::Client::new(),
            "https://platform.example.com//",
        );
        assert_eq!(client.api_base(), "https://platform.example.com");
    }

    #[test]
    fn trust_anchor_rejects_garbage_pem() {
        let result = ClusterClient::with_trust_anchor("https://platform.example.com", b"not a pem");
        assert!(result.is_err());
    }
}
