//! branch facts command - Behind / modified / conflicted through the cache

use anyhow::{Context as _, Result};

use super::Session;
use crate::cache::BranchFacts;
use crate::cli::Context;
use crate::core::types::BranchName;

/// Resolve and print the cached facts for `branch`, writing results back.
pub fn facts(ctx: &Context, branch: &str, base: Option<&str>, refresh: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let branch = BranchName::new(branch).context("Invalid branch name")?;
    let base = session.base_branch(base)?;

    let mut cache_file = session.open_cache()?;
    let report = {
        let mut facts = BranchFacts::new(cache_file.cache_mut(), &session.git);
        if refresh {
            facts.refresh(&branch, &base)
        } else {
            facts.report(&branch, &base)
        }
    }
    .with_context(|| format!("Failed to resolve facts for '{}'", branch))?;
    cache_file.flush().context("Failed to write branch cache")?;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize facts")?;
    println!("{}", json);
    Ok(())
}
