//! cli
//!
//! Command-line interface layer for depbot.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//!
//! The CLI is a maintenance surface over the branch cache: it lets an
//! operator inspect, reset, and re-derive cached branch state without a
//! full bot run.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;
use std::path::PathBuf;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub cwd: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
