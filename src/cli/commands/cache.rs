//! cache command - Show, update, or clear the branch cache

use anyhow::{anyhow, Context as _, Result};

use super::Session;
use crate::cache::{set_branch_new_commit, RepoCacheFile};
use crate::cli::Context;
use crate::core::types::{BranchName, CommitSha};
use crate::git::CommitResolver;

/// Print the branch cache as JSON.
pub fn show(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let cache_file = session.open_cache()?;
    let json = cache_file
        .cache()
        .to_json()
        .context("Failed to serialize branch cache")?;
    // Read-only: never bump the revision
    cache_file.discard();
    println!("{}", json);
    Ok(())
}

/// Record a new head for `branch`, resetting its cached facts.
pub fn set_commit(ctx: &Context, branch: &str, base: &str, sha: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let branch = BranchName::new(branch).context("Invalid branch name")?;
    let base = BranchName::new(base).context("Invalid base branch name")?;

    let sha = match sha {
        Some(sha) => CommitSha::new(sha).context("Invalid commit")?,
        None => session
            .git
            .branch_commit(&branch)?
            .ok_or_else(|| anyhow!("Branch '{}' does not exist", branch))?,
    };

    let mut cache_file = session.open_cache()?;
    let record = set_branch_new_commit(cache_file.cache_mut(), &session.git, &branch, &base, &sha)
        .context("Failed to update branch cache")?
        .clone();
    cache_file.flush().context("Failed to write branch cache")?;

    if !ctx.quiet {
        match &record.base_branch_sha {
            Some(base_sha) => println!(
                "Cached {} at {} (base {} at {})",
                branch,
                sha.short(7),
                base,
                base_sha.short(7)
            ),
            None => println!("Cached {} at {} (base {} not found)", branch, sha.short(7), base),
        }
    }
    Ok(())
}

/// Delete the persisted branch cache.
pub fn clear(ctx: &Context) -> Result<()> {
    let session = Session::open(ctx)?;
    let path = session.paths.repo_cache_path();
    let removed = RepoCacheFile::remove(&path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;

    if !ctx.quiet {
        if removed {
            println!("Removed {}", path.display());
        } else {
            println!("No branch cache to remove");
        }
    }
    Ok(())
}
