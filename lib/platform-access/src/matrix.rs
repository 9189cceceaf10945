//! The host's permission matrix, as seen by the realm.
//!
//! The host CI server authorizes requests against a matrix mapping identity
//! strings to permission sets. The realm never mutates that matrix in place:
//! the policy object is effectively immutable after construction, so updates
//! build a full replacement and swap it (see [`crate::sync`]).
//!
//! Identities written by the realm are [`MatrixKey`]s: the external user name
//! with the resolved tier's suffix appended. The suffix is derived from the
//! verified tier on the server side, never from user input, so a crafted
//! external name like `foo-admin` can at most obtain the key
//! `foo-admin-<its own tier>` and the permissions of that tier.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tier::PrivilegeTier;

/// A single permission in the host's matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    OverallRead,
    OverallAdminister,
    OverallRunScripts,
    ItemRead,
    ItemDiscover,
    ItemBuild,
    ItemConfigure,
    ItemCreate,
    ItemDelete,
    ItemCancel,
    ItemWorkspace,
    ScmTag,
    RunDelete,
    RunUpdate,
    ComputerConfigure,
    ComputerDelete,
    ViewConfigure,
    ViewCreate,
    ViewDelete,
    CredentialsView,
    CredentialsCreate,
    CredentialsUpdate,
    CredentialsDelete,
    CredentialsManageDomains,
}

/// Permissions granted by the view tier.
const VIEW_GRANTS: &[Permission] = &[
    Permission::OverallRead,
    Permission::ItemRead,
    Permission::ItemDiscover,
    Permission::CredentialsView,
];

/// Permissions the edit tier grants in addition to the view tier's.
const EDIT_GRANTS: &[Permission] = &[
    Permission::ItemBuild,
    Permission::ItemConfigure,
    Permission::ItemCreate,
    Permission::ItemDelete,
    Permission::ItemCancel,
    Permission::ItemWorkspace,
    Permission::ScmTag,
    Permission::OverallRunScripts,
];

/// Permissions the admin tier grants in addition to the edit tier's.
const ADMIN_GRANTS: &[Permission] = &[
    Permission::OverallAdminister,
    Permission::ComputerConfigure,
    Permission::ComputerDelete,
    Permission::RunDelete,
    Permission::RunUpdate,
    Permission::ViewConfigure,
    Permission::ViewCreate,
    Permission::ViewDelete,
    Permission::CredentialsCreate,
    Permission::CredentialsUpdate,
    Permission::CredentialsDelete,
    Permission::CredentialsManageDomains,
];

/// Returns the full permission set for a tier.
///
/// The escalation table is monotonic: edit includes everything view grants,
/// admin includes everything edit grants.
#[must_use]
pub fn granted_permissions(tier: PrivilegeTier) -> BTreeSet<Permission> {
    let mut grants: BTreeSet<Permission> = VIEW_GRANTS.iter().copied().collect();
    if tier >= PrivilegeTier::Edit {
        grants.extend(EDIT_GRANTS.iter().copied());
    }
    if tier >= PrivilegeTier::Admin {
        grants.extend(ADMIN_GRANTS.iter().copied());
    }
    grants
}

/// The identity string the host's matrix actually grants permissions to.
///
/// Always `<external user name><tier suffix>`. Constructed only from a
/// verified tier; there is deliberately no way to build one from a raw
/// string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatrixKey(String);

impl MatrixKey {
    /// Derives the matrix key for an external user at a tier.
    #[must_use]
    pub fn derive(external_name: &str, tier: PrivilegeTier) -> Self {
        Self(format!("{external_name}{}", tier.suffix()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MatrixKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the host's matrix supports per-project scoping.
///
/// The synchronizer is agnostic to the variant; it only has to rebuild a
/// replacement of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixScope {
    /// One global matrix for the whole host.
    Global,
    /// Global matrix plus per-project overrides.
    Project,
}

/// A snapshot of the host's authorization policy.
///
/// Append-mostly: identities are added during login synchronization and
/// otherwise copied verbatim between generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixPolicy {
    scope: MatrixScope,
    grants: BTreeMap<String, BTreeSet<Permission>>,
}

impl MatrixPolicy {
    /// Creates an empty policy with the given scope.
    #[must_use]
    pub fn new(scope: MatrixScope) -> Self {
        Self {
            scope,
            grants: BTreeMap::new(),
        }
    }

    /// Returns the policy's scope variant.
    #[must_use]
    pub fn scope(&self) -> MatrixScope {
        self.scope
    }

    /// Creates an empty policy of the same concrete shape as this one.
    #[must_use]
    pub fn same_shape(&self) -> Self {
        Self::new(self.scope)
    }

    /// Returns all identities known to the matrix.
    #[must_use]
    pub fn identities(&self) -> Vec<&str> {
        self.grants.keys().map(String::as_str).collect()
    }

    /// Returns true if the identity already has an entry.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.grants.contains_key(identity)
    }

    /// Returns true if the identity holds the permission.
    #[must_use]
    pub fn has_permission(&self, identity: &str, permission: Permission) -> bool {
        self.grants
            .get(identity)
            .is_some_and(|set| set.contains(&permission))
    }

    /// Grants a permission to an identity.
    ///
    /// Only to be used while building a replacement policy; the active policy
    /// is treated as immutable.
    pub fn add(&mut self, permission: Permission, identity: &str) {
        self.grants
            .entry(identity.to_string())
            .or_default()
            .insert(permission);
    }

    /// Returns the permission set for an identity, if any.
    #[must_use]
    pub fn grants_for(&self, identity: &str) -> Option<&BTreeSet<Permission>> {
        self.grants.get(identity)
    }
}

/// An authenticated principal produced by matrix synchronization.
///
/// The matrix key carries the tier suffix; the display name does not. The
/// suffix is internal bookkeeping, never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    matrix_key: MatrixKey,
    display_name: String,
}

impl AuthenticatedPrincipal {
    /// Creates a principal for a matrix key, displayed under the unsuffixed
    /// external name.
    #[must_use]
    pub fn new(matrix_key: MatrixKey, display_name: String) -> Self {
        Self {
            matrix_key,
            display_name,
        }
    }

    /// Returns the matrix key the host authorizes against.
    #[must_use]
    pub fn matrix_key(&self) -> &MatrixKey {
        &self.matrix_key
    }

    /// Returns the user-visible display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// The host's policy store seam.
///
/// The permission-checking engine behind it is out of scope; the realm only
/// reads the active policy, swaps in replacements, and asks for persistence.
pub trait PolicyStore: Send + Sync {
    /// Returns a snapshot of the active policy.
    fn active_policy(&self) -> MatrixPolicy;

    /// Replaces the active policy with a freshly built one.
    fn replace_active_policy(&self, policy: MatrixPolicy);

    /// Persists the active policy to the host's durable storage.
    ///
    /// Failures are surfaced so the caller can log them; they are never
    /// fatal to a login, the in-memory policy is already current.
    fn persist(&self) -> Result<(), crate::error::PersistenceError>;
}

/// The host's session-principal seam.
pub trait PrincipalDirectory: Send + Sync {
    /// Records the authenticated principal for the current session.
    fn set_authentication(&self, principal: &AuthenticatedPrincipal);

    /// Sets the display name shown for a matrix-key identity.
    fn set_display_name(&self, matrix_key: &MatrixKey, display_name: &str);
}
