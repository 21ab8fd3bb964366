//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// depbot - branch-state cache maintenance for the dependency update bot
#[derive(Parser, Debug)]
#[command(name = "depbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if depbot was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or edit the repository's branch cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Branch state queries served through the cache
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the branch cache as JSON
    Show,

    /// Record a new head commit for a branch, resetting its cached facts
    #[command(
        name = "set-commit",
        after_help = "\
EXAMPLES:
    # Record the branch's current head
    depbot cache set-commit depbot/serde-1.x main

    # Record an explicit commit
    depbot cache set-commit depbot/serde-1.x main 3f2a9c1"
    )]
    SetCommit {
        /// Branch whose head changed
        branch: String,

        /// Base branch the branch targets
        base: String,

        /// New head commit (defaults to the branch's current head)
        sha: Option<String>,
    },

    /// Delete the persisted branch cache
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum BranchAction {
    /// Show whether a branch is behind its base, modified, or conflicted
    Facts {
        /// Branch to inspect
        branch: String,

        /// Base branch (defaults to the configured base_branch)
        #[arg(long)]
        base: Option<String>,

        /// Recompute every fact from git instead of trusting the cache
        #[arg(long)]
        refresh: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_commit_without_sha() {
        let cli = Cli::try_parse_from(["depbot", "cache", "set-commit", "feature", "main"]).unwrap();
        match cli.command {
            Command::Cache {
                action: CacheAction::SetCommit { branch, base, sha },
            } => {
                assert_eq!(branch, "feature");
                assert_eq!(base, "main");
                assert!(sha.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["depbot", "branch", "facts", "feature", "--refresh", "--debug"])
            .unwrap();
        assert!(cli.debug);
        assert!(matches!(
            cli.command,
            Command::Branch {
                action: BranchAction::Facts { refresh: true, .. }
            }
        ));
    }
}
