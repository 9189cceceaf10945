//! Authentication module for the cluster-login server.
//!
//! This module provides:
//! - The OAuth security realm backed by the cluster platform's provider
//! - Startup auto-discovery of realm defaults from the pod environment
//! - Login, callback, and logout routes for Axum
//! - The in-memory host adapter the synchronizer writes through
//!
//! # Authorization Model
//!
//! The platform is the source of truth for who may do what: after the
//! OAuth exchange, the user's own token is used to run one access review
//! per privilege tier in the configured namespace. The highest allowed
//! tier is merged into the host's permission matrix under a suffixed
//! identity; a user with no allowed tier is never authenticated at all.
//! Role changes on the platform take effect on the next login.

pub mod discovery;
pub mod host;
pub mod realm;
pub mod routes;

use crate::config::SessionConfig;
use cluster_login_platform_access::{MatrixSynchronizer, PendingStore};
use std::sync::Arc;

pub use discovery::{DiscoveryOutcome, discover};
pub use host::InMemoryHost;
pub use realm::{OAuthRealm, ResolvedRealm};
pub use routes::{callback, login, logout};

/// Shared application state.
pub struct AppState {
    /// The OAuth security realm.
    pub realm: OAuthRealm,
    /// Pending authorizations keyed by browser session.
    pub pending: PendingStore,
    /// Merges resolved tiers into the host's permission matrix.
    pub synchronizer: MatrixSynchronizer,
    /// The host's policy store and principal directory.
    pub host: Arc<InMemoryHost>,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        realm: OAuthRealm,
        pending: PendingStore,
        host: Arc<InMemoryHost>,
        session_config: SessionConfig,
    ) -> Self {
        let synchronizer = MatrixSynchronizer::new(host.clone(), host.clone());
        Self {
            realm,
            pending,
            synchronizer,
            host,
            session_config,
        }
    }
}
