//! platform::capabilities
//!
//! Optional platform operations and the set each adapter declares.
//!
//! # Architecture
//!
//! A capability either exists for an adapter or does not. Each adapter
//! declares its [`CapabilitySet`] when it is constructed, and callers query
//! it before reaching for the matching optional trait. Absence is a plain
//! fact, never an error.
//!
//! # Example
//!
//! ```
//! use depbot::platform::{Capability, CapabilitySet};
//!
//! let caps = CapabilitySet::from_iter([
//!     Capability::VulnerabilityAlerts,
//!     Capability::BranchForceRebase,
//! ]);
//!
//! assert!(caps.has(Capability::VulnerabilityAlerts));
//! assert!(!caps.has(Capability::LabelLimit));
//! assert_eq!(
//!     caps.missing(&[Capability::BranchForceRebase, Capability::GroupMembers]),
//!     vec![Capability::GroupMembers]
//! );
//! ```

use std::collections::BTreeSet;

use serde::Serialize;

/// An optional platform operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// List security advisories affecting the repository.
    VulnerabilityAlerts,
    /// Expand group or team handles into member usernames.
    GroupMembers,
    /// Parse code-owner rules from CODEOWNERS lines.
    CodeOwnerRules,
    /// Re-enable provider-native automerge on a PR.
    AutomergeReattempt,
    /// Whether branch protection forces branches to be up to date.
    BranchForceRebase,
    /// Reopen a PR that the provider closed automatically.
    AutoclosedPrReuse,
    /// Drop users that cannot be assigned or requested.
    UserAvailability,
    /// Maximum label length accepted by the provider.
    LabelLimit,
    /// Re-read a single PR, bypassing cached copies.
    PrRefresh,
    /// Create commits through the provider API instead of a local push.
    PlatformCommit,
    /// Update a fork's base branch from its upstream.
    ForkSync,
}

impl Capability {
    /// Every capability, in declaration order.
    pub fn all() -> &'static [Capability] {
        &[
            Capability::VulnerabilityAlerts,
            Capability::GroupMembers,
            Capability::CodeOwnerRules,
            Capability::AutomergeReattempt,
            Capability::BranchForceRebase,
            Capability::AutoclosedPrReuse,
            Capability::UserAvailability,
            Capability::LabelLimit,
            Capability::PrRefresh,
            Capability::PlatformCommit,
            Capability::ForkSync,
        ]
    }

    /// Stable name used in output.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::VulnerabilityAlerts => "vulnerability-alerts",
            Capability::GroupMembers => "group-members",
            Capability::CodeOwnerRules => "code-owner-rules",
            Capability::AutomergeReattempt => "automerge-reattempt",
            Capability::BranchForceRebase => "branch-force-rebase",
            Capability::AutoclosedPrReuse => "autoclosed-pr-reuse",
            Capability::UserAvailability => "user-availability",
            Capability::LabelLimit => "label-limit",
            Capability::PrRefresh => "pr-refresh",
            Capability::PlatformCommit => "platform-commit",
            Capability::ForkSync => "fork-sync",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The optional operations an adapter supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    caps: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability.
    pub fn all() -> Self {
        Capability::all().iter().copied().collect()
    }

    pub fn insert(&mut self, cap: Capability) {
        self.caps.insert(cap);
    }

    pub fn remove(&mut self, cap: Capability) {
        self.caps.remove(&cap);
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }

    /// Capabilities in `required` that this set lacks, in input order.
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required.iter().copied().filter(|c| !self.has(*c)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.caps.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            caps: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_capability() {
        let set = CapabilitySet::all();
        assert_eq!(set.len(), Capability::all().len());
        for cap in Capability::all() {
            assert!(set.has(*cap));
        }
    }

    #[test]
    fn insert_and_remove() {
        let mut set = CapabilitySet::new();
        assert!(set.is_empty());
        set.insert(Capability::LabelLimit);
        assert!(set.has(Capability::LabelLimit));
        set.remove(Capability::LabelLimit);
        assert!(!set.has(Capability::LabelLimit));
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Capability::all().iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Capability::all().len());
    }
}
