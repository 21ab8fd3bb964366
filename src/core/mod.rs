//! core
//!
//! Core domain types, configuration, and storage paths.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, CommitSha, GitAuthor, Fingerprint
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for depbot storage

pub mod config;
pub mod paths;
pub mod types;
