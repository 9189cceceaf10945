//! Platform access and authorization for the cluster-login realm.
//!
//! This crate provides:
//! - Privilege tiers resolved from the cluster platform (`PrivilegeTier`,
//!   `TierSet`)
//! - The host's permission matrix model and synchronization
//!   (`MatrixPolicy`, `MatrixSynchronizer`)
//! - The explicit-else-discovered configuration chain (`RealmSettings`,
//!   `EffectiveConfig`)
//! - Session binding for the two-request login flow (`PendingStore`)
//!
//! # Access Control Model
//!
//! The platform reports coarse roles per namespace; the realm recognizes
//! exactly three ordered tiers, view < edit < admin. The highest allowed
//! tier drives a suffixed matrix key (`alice` at edit becomes `alice-edit`)
//! carrying only that tier's permission set. A principal with no allowed
//! tier is never authenticated at all.
//!
//! # Example
//!
//! ```
//! use cluster_login_platform_access::{
//!     EffectiveConfig, DiscoveredDefaults, MatrixKey, PrivilegeTier, RealmSettings, TierSet,
//! };
//!
//! // Resolve operator settings against auto-discovered defaults.
//! let settings = RealmSettings {
//!     client_id: Some("explicit-client".to_string()),
//!     ..Default::default()
//! };
//! let discovered = DiscoveredDefaults {
//!     namespace: Some("ci".to_string()),
//!     bearer_token: Some("sa-token".to_string()),
//!     ..Default::default()
//! };
//! let config = EffectiveConfig::resolve(&settings, &discovered);
//! assert_eq!(config.require_client_id().unwrap(), "explicit-client");
//!
//! // The highest allowed tier drives the matrix key.
//! let tiers: TierSet = [PrivilegeTier::View, PrivilegeTier::Edit].into_iter().collect();
//! let key = MatrixKey::derive("alice", tiers.highest().unwrap());
//! assert_eq!(key.as_str(), "alice-edit");
//! ```

pub mod config;
pub mod error;
pub mod matrix;
pub mod session;
pub mod sync;
pub mod tier;

// Re-export main types at crate root
pub use config::{
    DEFAULT_API_BASE, DEFAULT_CREDENTIAL_DIR, DiscoveredDefaults, EffectiveConfig, RealmSettings,
};
pub use error::{LoginError, PersistenceError};
pub use matrix::{
    AuthenticatedPrincipal, MatrixKey, MatrixPolicy, MatrixScope, Permission, PolicyStore,
    PrincipalDirectory, granted_permissions,
};
pub use session::{BearerCredential, PendingAuthorization, PendingStore, SessionKey};
pub use sync::MatrixSynchronizer;
pub use tier::{PrivilegeTier, TierSet};
