//! Privilege tiers recognized from the cluster platform.
//!
//! The platform grants users coarse-grained roles per namespace. The realm
//! recognizes exactly three, ordered `view < edit < admin`. A user's
//! effective tier is the highest one the platform's access-review endpoint
//! reports as allowed.

use serde::{Deserialize, Serialize};

/// A privilege tier on the cluster platform.
///
/// The derived `Ord` follows the declaration order, so `View < Edit < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeTier {
    /// Read-only access to the namespace.
    View,
    /// Can modify workloads in the namespace.
    Edit,
    /// Full control over the namespace.
    Admin,
}

impl PrivilegeTier {
    /// All tiers in ascending privilege order.
    pub const ALL: [PrivilegeTier; 3] = [Self::View, Self::Edit, Self::Admin];

    /// The verb sent to the access-review endpoint for this tier.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Admin => "admin",
        }
    }

    /// The suffix appended to an external user name to form a matrix key.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::View => "-view",
            Self::Edit => "-edit",
            Self::Admin => "-admin",
        }
    }
}

impl std::fmt::Display for PrivilegeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// The set of tiers the platform reported as allowed for a principal.
///
/// Tiers are independent checks on the wire; the set is not necessarily
/// contiguous. Only the highest tier present drives the matrix key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSet {
    tiers: Vec<PrivilegeTier>,
}

impl TierSet {
    /// Creates an empty tier set (no recognized roles).
    #[must_use]
    pub fn none() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Adds a tier to the set. Duplicates are ignored.
    pub fn insert(&mut self, tier: PrivilegeTier) {
        if !self.tiers.contains(&tier) {
            self.tiers.push(tier);
        }
    }

    /// Returns true if no tier was allowed.
    ///
    /// A principal with an empty tier set must not be authenticated at all;
    /// it gets no entry in the host's permission matrix.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Returns true if the given tier is present.
    #[must_use]
    pub fn contains(&self, tier: PrivilegeTier) -> bool {
        self.tiers.contains(&tier)
    }

    /// Returns the highest tier present, by the fixed admin > edit > view
    /// precedence.
    #[must_use]
    pub fn highest(&self) -> Option<PrivilegeTier> {
        self.tiers.iter().copied().max()
    }

    /// Returns the tiers in the set.
    #[must_use]
    pub fn tiers(&self) -> &[PrivilegeTier] {
        &self.tiers
    }
}

impl FromIterator<PrivilegeTier> for TierSet {
    fn from_iter<I: IntoIterator<Item = PrivilegeTier>>(iter: I) -> Self {
        let mut set = Self::none();
        for tier in iter {
            set.insert(tier);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_matches_privilege() {
        assert!(PrivilegeTier::View < PrivilegeTier::Edit);
        assert!(PrivilegeTier::Edit < PrivilegeTier::Admin);
    }

    #[test]
    fn tier_verbs_and_suffixes() {
        assert_eq!(PrivilegeTier::View.verb(), "view");
        assert_eq!(PrivilegeTier::Edit.suffix(), "-edit");
        assert_eq!(PrivilegeTier::Admin.suffix(), "-admin");
    }

    #[test]
    fn empty_set_has_no_highest() {
        let set = TierSet::none();
        assert!(set.is_empty());
        assert_eq!(set.highest(), None);
    }

    #[test]
    fn highest_prefers_admin_over_edit_over_view() {
        let all: TierSet = PrivilegeTier::ALL.into_iter().collect();
        assert_eq!(all.highest(), Some(PrivilegeTier::Admin));

        let edit_view: TierSet = [PrivilegeTier::View, PrivilegeTier::Edit]
            .into_iter()
            .collect();
        assert_eq!(edit_view.highest(), Some(PrivilegeTier::Edit));

        let view_only: TierSet = [PrivilegeTier::View].into_iter().collect();
        assert_eq!(view_only.highest(), Some(PrivilegeTier::View));
    }

    #[test]
    fn highest_is_order_independent() {
        let forward: TierSet = [PrivilegeTier::View, PrivilegeTier::Admin]
            .into_iter()
            .collect();
        let backward: TierSet = [PrivilegeTier::Admin, PrivilegeTier::View]
            .into_iter()
            .collect();
        assert_eq!(forward.highest(), backward.highest());
    }

    #[test]
    fn insert_ignores_duplicates() {
        let mut set = TierSet::none();
        set.insert(PrivilegeTier::Edit);
        set.insert(PrivilegeTier::Edit);
        assert_eq!(set.tiers().len(), 1);
    }

    #[test]
    fn tier_serialization_format() {
        let json = serde_json::to_string(&PrivilegeTier::Admin).expect("serialize");
        assert_eq!(json, "\"admin\"");
    }
}
