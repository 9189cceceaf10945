//! In-memory host adapter for the permission matrix and principal records.
//!
//! Stands in for the automation host's own configuration store: the active
//! matrix policy lives in memory and is optionally snapshotted to disk as
//! JSON so a restart comes back with the grants it had. Principal records
//! (who has authenticated, and under what display name) are in-memory only.

use cluster_login_platform_access::{
    AuthenticatedPrincipal, MatrixKey, MatrixPolicy, MatrixScope, PersistenceError, PolicyStore,
    PrincipalDirectory,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// Host state shared between the synchronizer and the HTTP handlers.
pub struct InMemoryHost {
    policy: Mutex<MatrixPolicy>,
    principals: Mutex<HashMap<String, PrincipalRecord>>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct PrincipalRecord {
    display_name: String,
    authenticated: bool,
}

impl InMemoryHost {
    /// Creates a host with an empty global policy and no snapshotting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: Mutex::new(MatrixPolicy::new(MatrixScope::Global)),
            principals: Mutex::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Creates a host that persists its policy to `path`, loading any
    /// existing snapshot.
    pub fn with_snapshot(path: PathBuf) -> Result<Self, PersistenceError> {
        let policy = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let policy: MatrixPolicy =
                    serde_json::from_str(&contents).map_err(|e| PersistenceError {
                        details: format!("corrupt policy snapshot {}: {e}", path.display()),
                    })?;
                info!(path = %path.display(), identities = policy.identities().len(), "loaded policy snapshot");
                policy
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no policy snapshot; starting empty");
                MatrixPolicy::new(MatrixScope::Global)
            }
            Err(e) => {
                return Err(PersistenceError {
                    details: format!("failed to read policy snapshot {}: {e}", path.display()),
                });
            }
        };

        Ok(Self {
            policy: Mutex::new(policy),
            principals: Mutex::new(HashMap::new()),
            snapshot_path: Some(path),
        })
    }

    /// Returns the display name recorded for a matrix-key identity.
    pub fn display_name(&self, matrix_key: &MatrixKey) -> Option<String> {
        let principals = self.principals.lock().unwrap_or_else(|p| p.into_inner());
        principals
            .get(matrix_key.as_str())
            .map(|record| record.display_name.clone())
    }

    /// Returns whether a matrix-key identity has authenticated.
    pub fn is_authenticated(&self, matrix_key: &MatrixKey) -> bool {
        let principals = self.principals.lock().unwrap_or_else(|p| p.into_inner());
        principals
            .get(matrix_key.as_str())
            .is_some_and(|record| record.authenticated)
    }
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore for InMemoryHost {
    fn active_policy(&self) -> MatrixPolicy {
        self.policy
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn replace_active_policy(&self, policy: MatrixPolicy) {
        *self.policy.lock().unwrap_or_else(|p| p.into_inner()) = policy;
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let policy = self.active_policy();
        let json = serde_json::to_string_pretty(&policy).map_err(|e| PersistenceError {
            details: format!("failed to serialize policy: {e}"),
        })?;
        std::fs::write(path, json).map_err(|e| PersistenceError {
            details: format!("failed to write policy snapshot {}: {e}", path.display()),
        })?;
        debug!(path = %path.display(), "persisted policy snapshot");
        Ok(())
    }
}

impl PrincipalDirectory for InMemoryHost {
    fn set_authentication(&self, principal: &AuthenticatedPrincipal) {
        let mut principals = self.principals.lock().unwrap_or_else(|p| p.into_inner());
        let record = principals
            .entry(principal.matrix_key().as_str().to_string())
            .or_insert_with(|| PrincipalRecord {
                display_name: principal.display_name().to_string(),
                authenticated: false,
            });
        record.authenticated = true;
    }

    fn set_display_name(&self, matrix_key: &MatrixKey, display_name: &str) {
        let mut principals = self.principals.lock().unwrap_or_else(|p| p.into_inner());
        principals
            .entry(matrix_key.as_str().to_string())
            .and_modify(|record| record.display_name = display_name.to_string())
            .or_insert_with(|| PrincipalRecord {
                display_name: display_name.to_string(),
                authenticated: false,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_login_platform_access::{Permission, PrivilegeTier};

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.json");

        let host = InMemoryHost::with_snapshot(path.clone()).expect("host");
        let mut policy = MatrixPolicy::new(MatrixScope::Global);
        policy.add(Permission::OverallRead, "alice-view");
        host.replace_active_policy(policy);
        host.persist().expect("persist");

        let reloaded = InMemoryHost::with_snapshot(path).expect("reload");
        let policy = reloaded.active_policy();
        assert!(policy.has_permission("alice-view", Permission::OverallRead));
    }

    #[test]
    fn missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = InMemoryHost::with_snapshot(dir.path().join("absent.json")).expect("host");
        assert!(host.active_policy().identities().is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.json");
        std::fs::write(&path, "not json").expect("write");
        assert!(InMemoryHost::with_snapshot(path).is_err());
    }

    #[test]
    fn display_name_is_tracked_separately_from_authentication() {
        let host = InMemoryHost::new();
        let key = MatrixKey::derive("alice", PrivilegeTier::Edit);

        host.set_display_name(&key, "alice");
        assert_eq!(host.display_name(&key), Some("alice".to_string()));
        assert!(!host.is_authenticated(&key));

        let principal = AuthenticatedPrincipal::new(key.clone(), "alice".to_string());
        host.set_authentication(&principal);
        assert!(host.is_authenticated(&key));
    }
}
