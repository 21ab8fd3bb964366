//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. All repository reads and
//! writes flow through [`Git`]. No other module imports `git2`, and nothing
//! shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Branch resolution (local first, then remote-tracking)
//! - Relationship facts: behind-base, modified, conflicted
//! - Committing file sets onto a branch and pushing them
//! - Local merges, branch deletion, file listing
//!
//! Consumers depend on the [`WorkingCopy`] and [`CommitResolver`] traits,
//! so tests can substitute in-memory doubles.

mod interface;
mod working_copy;

pub use interface::{Git, GitError, GitOptions};
pub use working_copy::{CommitFilesConfig, CommitResolver, FileChange, WorkingCopy};
