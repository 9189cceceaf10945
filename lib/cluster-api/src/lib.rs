//! Cluster platform API client for the cluster-login realm.
//!
//! Wraps the platform's REST surface the login flow depends on: OAuth
//! provider discovery, acting-identity lookup, and subject access reviews.
//! Every call is authenticated with a bearer token supplied by the caller,
//! either the service account's token during discovery or the user's access
//! token after the code exchange.

mod client;
mod error;
mod types;

pub use client::ClusterClient;
pub use error::ClusterApiError;
pub use types::{AccessReviewRequest, AccessReviewResponse, ProviderMetadata, UserIdentity};
