//! cache::types
//!
//! Persisted branch-cache records and the per-repository store.
//!
//! # Schema
//!
//! ```json
//! {
//!   "repository": "acme/widgets",
//!   "fingerprint": "9c1e…",
//!   "revision": 4,
//!   "lastModified": "2026-05-01T10:00:00Z",
//!   "branches": [
//!     {
//!       "branchName": "depbot/serde-1.x",
//!       "baseBranch": "main",
//!       "sha": "4f2a9c1…",
//!       "baseBranchSha": "77d0e3b…",
//!       "parentSha": "77d0e3b…",
//!       "isBehindBase": false,
//!       "isModified": false,
//!       "isConflicted": false
//!     }
//!   ]
//! }
//! ```
//!
//! # Invariants
//!
//! - At most one [`BranchCache`] per branch name. [`RepoCache::upsert`]
//!   overwrites in place on a name match, and loading rejects duplicates.
//! - `branches` keeps insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CacheError;
use crate::core::types::{BranchName, CommitSha, Fingerprint};

/// Memoized git-derived facts for one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCache {
    pub branch_name: BranchName,
    pub base_branch: BranchName,
    pub sha: CommitSha,
    /// Head of `base_branch` at last observation; `None` if it was missing.
    pub base_branch_sha: Option<CommitSha>,
    /// Commit this branch is expected to sit on.
    pub parent_sha: Option<CommitSha>,
    pub is_behind_base: bool,
    pub is_modified: bool,
    pub is_conflicted: bool,
}

impl BranchCache {
    /// A record for a commit the bot just produced on top of `base_sha`.
    ///
    /// All flags start `false`.
    pub fn fresh(
        branch_name: BranchName,
        base_branch: BranchName,
        sha: CommitSha,
        base_sha: Option<CommitSha>,
    ) -> Self {
        Self {
            branch_name,
            base_branch,
            sha,
            parent_sha: base_sha.clone(),
            base_branch_sha: base_sha,
            is_behind_base: false,
            is_modified: false,
            is_conflicted: false,
        }
    }

    /// True if any derived flag is set.
    pub fn has_flags(&self) -> bool {
        self.is_behind_base || self.is_modified || self.is_conflicted
    }
}

/// The branch cache of one repository.
///
/// Owned exclusively by the processing pass for that repository and passed
/// by reference to everything that reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoCache {
    /// Repository identifier (e.g. `owner/name`).
    pub repository: String,

    /// Fingerprint of the repository at the time the cache was written.
    pub fingerprint: Option<Fingerprint>,

    /// Incremented on every flush.
    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default)]
    branches: Vec<BranchCache>,
}

impl RepoCache {
    /// An empty cache for `repository`.
    pub fn new(repository: impl Into<String>, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            repository: repository.into(),
            fingerprint,
            revision: 0,
            last_modified: None,
            branches: Vec::new(),
        }
    }

    /// Parse a persisted cache, rejecting duplicate branch records.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let cache: RepoCache =
            serde_json::from_str(json).map_err(|e| CacheError::Parse(e.to_string()))?;
        cache.check_unique()?;
        Ok(cache)
    }

    /// Serialize for persistence.
    pub fn to_json(&self) -> Result<String, CacheError> {
        serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialize(e.to_string()))
    }

    fn check_unique(&self) -> Result<(), CacheError> {
        let mut seen = std::collections::HashSet::new();
        for record in &self.branches {
            if !seen.insert(&record.branch_name) {
                return Err(CacheError::DuplicateBranch(record.branch_name.to_string()));
            }
        }
        Ok(())
    }

    /// Look up the record for `name`.
    pub fn branch(&self, name: &BranchName) -> Option<&BranchCache> {
        self.branches.iter().find(|b| &b.branch_name == name)
    }

    /// Mutable lookup of the record for `name`.
    pub fn branch_mut(&mut self, name: &BranchName) -> Option<&mut BranchCache> {
        self.branches.iter_mut().find(|b| &b.branch_name == name)
    }

    /// Insert `record`, overwriting any record with the same branch name in place.
    pub fn upsert(&mut self, record: BranchCache) -> &mut BranchCache {
        match self
            .branches
            .iter()
            .position(|b| b.branch_name == record.branch_name)
        {
            Some(idx) => {
                self.branches[idx] = record;
                &mut self.branches[idx]
            }
            None => {
                self.branches.push(record);
                let last = self.branches.len() - 1;
                &mut self.branches[last]
            }
        }
    }

    /// Remove and return the record for `name`.
    pub fn remove(&mut self, name: &BranchName) -> Option<BranchCache> {
        let idx = self.branches.iter().position(|b| &b.branch_name == name)?;
        Some(self.branches.remove(idx))
    }

    /// All records in insertion order.
    pub fn branches(&self) -> &[BranchCache] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Record a persisted revision.
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
        self.last_modified = Some(Utc::now());
    }
}
