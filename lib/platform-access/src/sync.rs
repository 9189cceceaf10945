//! Synchronizes externally resolved privilege tiers into the host's matrix.
//!
//! The host's policy object is effectively immutable outside of
//! construction-time mutation, and the host offers no finer-grained locking,
//! so every login performs its read-copy-write of the shared object under one
//! process-wide lock and publishes a freshly built replacement. Readers never
//! observe a half-updated grant set.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::matrix::{
    AuthenticatedPrincipal, MatrixKey, PolicyStore, PrincipalDirectory, granted_permissions,
};
use crate::tier::TierSet;

/// Merges a principal's resolved tier into the shared authorization matrix.
pub struct MatrixSynchronizer {
    policies: Arc<dyn PolicyStore>,
    principals: Arc<dyn PrincipalDirectory>,
    update_lock: Mutex<()>,
}

impl MatrixSynchronizer {
    /// Creates a synchronizer over the host's policy store and principal
    /// directory.
    #[must_use]
    pub fn new(policies: Arc<dyn PolicyStore>, principals: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            policies,
            principals,
            update_lock: Mutex::new(()),
        }
    }

    /// Grants the permissions for the principal's highest tier and returns
    /// the authenticated principal.
    ///
    /// Returns `None` when no tier was allowed: the caller must leave the
    /// requester anonymous, so an external identity with zero recognized
    /// roles gets no entry in the matrix at all. Idempotent per (user, tier)
    /// pair; a key that already exists skips the rebuild entirely.
    #[instrument(skip(self, tiers), fields(user = %external_name))]
    pub async fn sync(&self, external_name: &str, tiers: &TierSet) -> Option<AuthenticatedPrincipal> {
        let tier = tiers.highest()?;
        let matrix_key = MatrixKey::derive(external_name, tier);

        {
            // Serializes all concurrent logins process-wide, not just
            // per-user: the read-copy-write below touches one shared object.
            let _guard = self.update_lock.lock().await;

            let existing = self.policies.active_policy();
            if existing.contains(matrix_key.as_str()) {
                debug!(%matrix_key, "matrix entry already present, skipping update");
            } else {
                let mut replacement = existing.same_shape();
                for identity in existing.identities() {
                    if let Some(grants) = existing.grants_for(identity) {
                        for permission in grants {
                            replacement.add(*permission, identity);
                        }
                    }
                }
                for permission in granted_permissions(tier) {
                    replacement.add(permission, matrix_key.as_str());
                }

                info!(%matrix_key, %tier, "adding matrix permissions for user");
                self.policies.replace_active_policy(replacement);
                if let Err(error) = self.policies.persist() {
                    // The in-memory policy is already current for this
                    // process; surface the failure and move on.
                    warn!(error = %error, "policy persistence failed after login");
                }
            }
        }

        let principal = AuthenticatedPrincipal::new(matrix_key, external_name.to_string());
        self.principals.set_authentication(&principal);
        self.principals
            .set_display_name(principal.matrix_key(), principal.display_name());
        Some(principal)
    }
}
