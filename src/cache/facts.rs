//! cache::facts
//!
//! Read-through access to the cached behind-base, modified, and conflicted
//! flags.
//!
//! A cached flag is only returned when the record's `sha`, `base_branch` and
//! `base_branch_sha` match the observed heads exactly. Any mismatch replaces
//! the record with a fresh one before a new flag is written, so flags from
//! different commits never mix.

use serde::Serialize;
use tracing::debug;

use super::types::{BranchCache, RepoCache};
use super::CacheError;
use crate::core::types::{BranchName, CommitSha};
use crate::git::{GitError, WorkingCopy};

/// Heads of a branch and its base as observed right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHeads {
    pub branch: BranchName,
    pub sha: CommitSha,
    pub base_branch: BranchName,
    pub base_sha: Option<CommitSha>,
}

impl BranchHeads {
    fn matches(&self, record: &BranchCache) -> bool {
        record.sha == self.sha
            && record.base_branch == self.base_branch
            && record.base_branch_sha == self.base_sha
    }
}

fn matching<'a>(cache: &'a RepoCache, heads: &BranchHeads) -> Option<&'a BranchCache> {
    cache.branch(&heads.branch).filter(|r| heads.matches(r))
}

/// The record for `heads`, replaced by a fresh one if it describes other commits.
fn record_for<'a>(cache: &'a mut RepoCache, heads: &BranchHeads) -> &'a mut BranchCache {
    let record = match cache.branch(&heads.branch) {
        Some(existing) if heads.matches(existing) => existing.clone(),
        _ => {
            debug!(branch = %heads.branch, sha = %heads.sha, "refreshing stale branch cache record");
            BranchCache::fresh(
                heads.branch.clone(),
                heads.base_branch.clone(),
                heads.sha.clone(),
                heads.base_sha.clone(),
            )
        }
    };
    cache.upsert(record)
}

/// Cached behind-base flag for exactly these heads.
pub fn cached_behind_base(cache: &RepoCache, heads: &BranchHeads) -> Option<bool> {
    matching(cache, heads).map(|r| r.is_behind_base)
}

pub fn set_cached_behind_base(cache: &mut RepoCache, heads: &BranchHeads, value: bool) {
    record_for(cache, heads).is_behind_base = value;
}

/// Cached modified flag for exactly these heads.
pub fn cached_modified(cache: &RepoCache, heads: &BranchHeads) -> Option<bool> {
    matching(cache, heads).map(|r| r.is_modified)
}

pub fn set_cached_modified(cache: &mut RepoCache, heads: &BranchHeads, value: bool) {
    record_for(cache, heads).is_modified = value;
}

/// Cached conflicted flag for exactly these heads.
pub fn cached_conflicted(cache: &RepoCache, heads: &BranchHeads) -> Option<bool> {
    matching(cache, heads).map(|r| r.is_conflicted)
}

pub fn set_cached_conflicted(cache: &mut RepoCache, heads: &BranchHeads, value: bool) {
    record_for(cache, heads).is_conflicted = value;
}

/// All three facts for one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFactsReport {
    pub is_behind_base: bool,
    pub is_modified: bool,
    pub is_conflicted: bool,
}

/// Resolves branch facts through the cache, falling back to the working copy.
///
/// # Example
///
/// ```ignore
/// let mut facts = BranchFacts::new(&mut cache, &git);
/// if facts.is_behind_base(&branch, &main)? {
///     // rebase
/// }
/// ```
pub struct BranchFacts<'a, W: WorkingCopy + ?Sized> {
    cache: &'a mut RepoCache,
    git: &'a W,
}

impl<'a, W: WorkingCopy + ?Sized> BranchFacts<'a, W> {
    pub fn new(cache: &'a mut RepoCache, git: &'a W) -> Self {
        Self { cache, git }
    }

    /// Resolve the current heads of `branch` and `base`.
    ///
    /// # Errors
    ///
    /// [`GitError::BranchNotFound`] if `branch` itself does not exist.
    pub fn observe(&self, branch: &BranchName, base: &BranchName) -> Result<BranchHeads, CacheError> {
        let sha = self
            .git
            .branch_commit(branch)?
            .ok_or_else(|| GitError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        let base_sha = self.git.branch_commit(base)?;
        Ok(BranchHeads {
            branch: branch.clone(),
            sha,
            base_branch: base.clone(),
            base_sha,
        })
    }

    pub fn is_behind_base(&mut self, branch: &BranchName, base: &BranchName) -> Result<bool, CacheError> {
        let heads = self.observe(branch, base)?;
        if let Some(value) = cached_behind_base(self.cache, &heads) {
            return Ok(value);
        }
        let value = self.git.is_branch_behind_base(branch, base)?;
        set_cached_behind_base(self.cache, &heads, value);
        Ok(value)
    }

    pub fn is_modified(&mut self, branch: &BranchName, base: &BranchName) -> Result<bool, CacheError> {
        let heads = self.observe(branch, base)?;
        if let Some(value) = cached_modified(self.cache, &heads) {
            return Ok(value);
        }
        let value = self.git.is_branch_modified(branch, base)?;
        set_cached_modified(self.cache, &heads, value);
        Ok(value)
    }

    pub fn is_conflicted(&mut self, branch: &BranchName, base: &BranchName) -> Result<bool, CacheError> {
        let heads = self.observe(branch, base)?;
        if let Some(value) = cached_conflicted(self.cache, &heads) {
            return Ok(value);
        }
        let value = self.git.is_branch_conflicted(base, branch)?;
        set_cached_conflicted(self.cache, &heads, value);
        Ok(value)
    }

    /// Recompute all three facts from the working copy and overwrite the record.
    pub fn refresh(&mut self, branch: &BranchName, base: &BranchName) -> Result<BranchFactsReport, CacheError> {
        let heads = self.observe(branch, base)?;
        let report = BranchFactsReport {
            is_behind_base: self.git.is_branch_behind_base(branch, base)?,
            is_modified: self.git.is_branch_modified(branch, base)?,
            is_conflicted: self.git.is_branch_conflicted(base, branch)?,
        };
        let record = record_for(self.cache, &heads);
        record.is_behind_base = report.is_behind_base;
        record.is_modified = report.is_modified;
        record.is_conflicted = report.is_conflicted;
        Ok(report)
    }

    /// All three facts: from the record when it matches the current heads,
    /// otherwise recomputed together.
    pub fn report(&mut self, branch: &BranchName, base: &BranchName) -> Result<BranchFactsReport, CacheError> {
        let heads = self.observe(branch, base)?;
        match matching(self.cache, &heads) {
            Some(record) => Ok(BranchFactsReport {
                is_behind_base: record.is_behind_base,
                is_modified: record.is_modified,
                is_conflicted: record.is_conflicted,
            }),
            None => self.refresh(branch, base),
        }
    }
}
