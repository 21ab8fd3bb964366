//! depbot - branch state and hosting-provider plumbing for a dependency update bot
//!
//! The bot keeps one branch per proposed dependency update. This crate
//! holds the pieces that let it decide cheaply whether such a branch needs
//! work, and the uniform interface it uses to talk to the hosting provider.
//!
//! # Architecture
//!
//! - [`cache`] - persisted per-repository branch cache and its invalidation
//! - [`git`] - working-copy operations (single doorway to `git2`)
//! - [`platform`] - hosting provider abstraction (GitHub, mock)
//! - [`core`] - domain types, configuration, and paths
//! - [`cli`] - maintenance command-line interface
//!
//! # Correctness Invariants
//!
//! 1. At most one cache record per branch name
//! 2. A cached fact is only trusted while the branch head, base branch,
//!    and base head it was computed against are unchanged
//! 3. Recording a new branch head resets every cached fact for that branch

pub mod cache;
pub mod cli;
pub mod core;
pub mod git;
pub mod platform;
