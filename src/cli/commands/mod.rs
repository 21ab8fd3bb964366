//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler opens a [`Session`] (repository, merged config, cache
//! paths), does its work through the library, and prints the result.

mod branch;
mod cache;

pub use branch::facts;
pub use cache::{clear, set_commit, show};

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};

use super::args::{BranchAction, CacheAction, Command};
use super::Context;
use crate::cache::RepoCacheFile;
use crate::core::config::Config;
use crate::core::paths::DepbotPaths;
use crate::core::types::BranchName;
use crate::git::{Git, GitOptions};
use url::Url;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Cache { action } => match action {
            CacheAction::Show => cache::show(ctx),
            CacheAction::SetCommit { branch, base, sha } => {
                cache::set_commit(ctx, &branch, &base, sha.as_deref())
            }
            CacheAction::Clear => cache::clear(ctx),
        },
        Command::Branch { action } => match action {
            BranchAction::Facts {
                branch,
                base,
                refresh,
            } => branch::facts(ctx, &branch, base.as_deref(), refresh),
        },
    }
}

/// An opened repository with its configuration.
pub(crate) struct Session {
    pub git: Git,
    pub config: Config,
    pub paths: DepbotPaths,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let cwd = match &ctx.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };

        // Config lives under the git dir, so locate the repository first
        let locator = Git::open(&cwd).context("Failed to open repository")?;
        let config = Config::load(Some(locator.git_dir()))
            .context("Failed to load config")?
            .config;
        drop(locator);

        let options = GitOptions {
            remote: config.remote().to_string(),
            author: config.git_author(),
            ignored_authors: config.ignored_authors(),
            token: Config::token(),
        };
        let git = Git::open_with(&cwd, options).context("Failed to open repository")?;
        let paths = DepbotPaths::new(git.git_dir().to_path_buf())
            .with_cache_dir(config.cache_dir().map(Path::to_path_buf));

        Ok(Self { git, config, paths })
    }

    /// Name the cache is recorded under: the remote URL without
    /// credentials, else the work tree.
    pub fn repository(&self) -> Result<String> {
        if let Some(url) = self.git.remote_url()? {
            return Ok(redact_remote_url(&url));
        }
        let dir: PathBuf = self.git.work_dir()?.to_path_buf();
        Ok(dir.display().to_string())
    }

    pub fn open_cache(&self) -> Result<RepoCacheFile> {
        let path = self.paths.repo_cache_path();
        RepoCacheFile::open(&path, &self.repository()?)
            .with_context(|| format!("Failed to open branch cache at {}", path.display()))
    }

    /// The explicit base branch, else the configured one.
    pub fn base_branch(&self, explicit: Option<&str>) -> Result<BranchName> {
        let name = explicit
            .or(self.config.base_branch())
            .ok_or_else(|| anyhow!("No base branch given. Pass --base or set base_branch in config."))?;
        BranchName::new(name).context("Invalid base branch name")
    }
}

/// Drop any `user:password@` from a remote URL.
///
/// scp-style remotes (`git@host:owner/repo`) are not URLs and carry no
/// secret, so they are returned unchanged.
pub fn redact_remote_url(remote: &str) -> String {
    let Ok(mut url) = Url::parse(remote) else {
        return remote.to_string();
    };
    if url.username().is_empty() && url.password().is_none() {
        return remote.to_string();
    }
    // Only fails for URLs that cannot carry credentials in the first place
    if url.set_username("").is_err() || url.set_password(None).is_err() {
        return remote.to_string();
    }
    url.to_string()
}
