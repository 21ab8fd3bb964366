//! git::working_copy
//!
//! The working-copy capability contract.
//!
//! These operations are the *producers* of the behind-base, modified, and
//! conflicted facts stored in the branch cache. The cache invalidator only
//! ever clears those facts; only results from this layer set them.
//!
//! [`CommitResolver`] is split out because the invalidator needs nothing
//! beyond commit lookup, which keeps its test doubles trivial.

use serde::{Deserialize, Serialize};

use super::GitError;
use crate::core::types::{BranchName, CommitSha};

/// Resolves a branch name to its current head commit.
pub trait CommitResolver {
    /// The branch's head commit, or `None` if the branch does not exist.
    fn branch_commit(&self, branch: &BranchName) -> Result<Option<CommitSha>, GitError>;
}

/// A single file change applied by [`WorkingCopy::commit_and_push`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileChange {
    /// Create or overwrite a file.
    Addition { path: String, contents: Vec<u8> },
    /// Remove a file (no-op if absent).
    Deletion { path: String },
}

impl FileChange {
    /// Convenience constructor for text content.
    pub fn addition(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        FileChange::Addition {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Convenience constructor for a deletion.
    pub fn deletion(path: impl Into<String>) -> Self {
        FileChange::Deletion { path: path.into() }
    }

    /// Repository-relative path affected by this change.
    pub fn path(&self) -> &str {
        match self {
            FileChange::Addition { path, .. } | FileChange::Deletion { path } => path,
        }
    }
}

/// Request to commit files onto a branch and push it.
///
/// The commit is always built on top of `base_branch`'s head, replacing
/// whatever the branch held before.
#[derive(Debug, Clone)]
pub struct CommitFilesConfig {
    pub branch_name: BranchName,
    pub base_branch: BranchName,
    pub files: Vec<FileChange>,
    pub message: String,
    /// Push even if the existing branch already has identical content.
    pub force: bool,
}

/// Local git operations for one repository's working copy.
///
/// Every consumer needing authoritative (non-cached) branch relationship
/// facts goes through this trait.
pub trait WorkingCopy: CommitResolver {
    /// Whether the branch exists locally or on the remote.
    fn branch_exists(&self, branch: &BranchName) -> Result<bool, GitError>;

    /// True iff `base` contains commits not reachable from `branch`.
    fn is_branch_behind_base(&self, branch: &BranchName, base: &BranchName)
        -> Result<bool, GitError>;

    /// True iff `branch` carries commits since `base` authored by someone other than the bot.
    fn is_branch_modified(&self, branch: &BranchName, base: &BranchName)
        -> Result<bool, GitError>;

    /// True iff merging `base` and `branch` would produce conflicts.
    fn is_branch_conflicted(&self, base: &BranchName, branch: &BranchName)
        -> Result<bool, GitError>;

    /// Check out `branch`, creating it from the remote-tracking branch if needed.
    fn checkout_branch(&self, branch: &BranchName) -> Result<CommitSha, GitError>;

    /// Commit `config.files` on top of the base branch and push the result.
    ///
    /// Returns `None` when there is nothing to commit.
    fn commit_and_push(&self, config: &CommitFilesConfig) -> Result<Option<CommitSha>, GitError>;

    /// Merge `branch` into the checked-out branch.
    fn merge_to_local(&self, branch: &BranchName) -> Result<(), GitError>;

    /// Merge `branch` into the checked-out branch and push it.
    fn merge_and_push(&self, branch: &BranchName) -> Result<(), GitError>;

    /// Delete `branch` locally and on the remote.
    fn delete_branch(&self, branch: &BranchName) -> Result<(), GitError>;

    /// Paths of all files at HEAD, sorted.
    fn get_file_list(&self) -> Result<Vec<String>, GitError>;
}
