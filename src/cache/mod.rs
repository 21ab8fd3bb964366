//! cache
//!
//! Per-repository branch cache.
//!
//! # Modules
//!
//! - [`types`] - [`RepoCache`] store and [`BranchCache`] records
//! - [`branch`] - [`set_branch_new_commit`], the write path for new commits
//! - [`facts`] - Read-through behind-base / modified / conflicted flags
//! - [`file`] - Locked load/flush session over the persisted JSON
//!
//! # Invariants
//!
//! - One record per branch name.
//! - After [`set_branch_new_commit`], `parent_sha == base_branch_sha` and all
//!   flags are `false`.
//! - Cached flags are only trusted on exact commit-id equality.

pub mod branch;
pub mod facts;
pub mod file;
pub mod types;

pub use branch::set_branch_new_commit;
pub use facts::{BranchFacts, BranchFactsReport, BranchHeads};
pub use file::RepoCacheFile;
pub use types::{BranchCache, RepoCache};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::git::GitError;

/// Errors from branch-cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Persisted cache holds two records for one branch.
    #[error("corrupt branch cache: duplicate record for branch '{0}'")]
    DuplicateBranch(String),

    /// Persisted cache is not valid JSON for the schema.
    #[error("failed to parse branch cache: {0}")]
    Parse(String),

    #[error("failed to serialize branch cache: {0}")]
    Serialize(String),

    /// Another pass holds the cache lock.
    #[error("branch cache is locked by another process: {}", path.display())]
    Locked { path: PathBuf },

    #[error("branch cache i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Resolving commits through the working copy failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
