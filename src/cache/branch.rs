//! cache::branch
//!
//! The single write path that reconciles a freshly produced commit with the
//! branch cache.
//!
//! Called whenever the bot has just pushed or observed a commit it controls.
//! Prior behind-base, modified, and conflicted findings are stale at that
//! point, so they are reset to `false` instead of being recomputed. A
//! consumer that needs an authoritative value asks the working copy later
//! (see [`super::facts`]).

use tracing::{debug, warn};

use super::types::{BranchCache, RepoCache};
use super::CacheError;
use crate::core::types::{BranchName, CommitSha};
use crate::git::CommitResolver;

/// Record `new_sha` as the head of `branch`, built on `base_branch`.
///
/// The record is created if absent, otherwise overwritten in place. Either
/// way `parent_sha == base_branch_sha` and every flag is `false` afterwards.
///
/// When `base_branch` cannot be resolved the record is still written, with
/// both base shas set to `None`.
///
/// # Errors
///
/// Resolver failures are returned as [`CacheError::Git`]; the cache is left
/// untouched in that case.
pub fn set_branch_new_commit<'a>(
    cache: &'a mut RepoCache,
    resolver: &dyn CommitResolver,
    branch: &BranchName,
    base_branch: &BranchName,
    new_sha: &CommitSha,
) -> Result<&'a BranchCache, CacheError> {
    let base_sha = resolver.branch_commit(base_branch)?;
    if base_sha.is_none() {
        warn!(branch = %branch, base_branch = %base_branch, "base branch not found, caching without base sha");
    }

    if cache.branch(branch).is_none() {
        debug!(branch = %branch, "setBranchCommit(): Branch cache not present");
    }

    let record = BranchCache::fresh(
        branch.clone(),
        base_branch.clone(),
        new_sha.clone(),
        base_sha,
    );
    Ok(cache.upsert(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitError;
    use std::collections::HashMap;

    struct Resolver(HashMap<String, String>);

    impl CommitResolver for Resolver {
        fn branch_commit(&self, branch: &BranchName) -> Result<Option<CommitSha>, GitError> {
            Ok(self
                .0
                .get(branch.as_str())
                .map(|s| CommitSha::new(s.as_str()).unwrap()))
        }
    }

    struct Broken;

    impl CommitResolver for Broken {
        fn branch_commit(&self, _: &BranchName) -> Result<Option<CommitSha>, GitError> {
            Err(GitError::Internal {
                message: "object database corrupt".into(),
            })
        }
    }

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn sha(s: &str) -> CommitSha {
        CommitSha::new(s).unwrap()
    }

    #[test]
    fn retargeting_updates_base_branch() {
        let resolver = Resolver(HashMap::from([
            ("main".to_string(), "m1".to_string()),
            ("develop".to_string(), "d1".to_string()),
        ]));
        let mut cache = RepoCache::new("acme/widgets", None);
        set_branch_new_commit(&mut cache, &resolver, &name("b"), &name("main"), &sha("s1")).unwrap();
        let record =
            set_branch_new_commit(&mut cache, &resolver, &name("b"), &name("develop"), &sha("s2"))
                .unwrap();

        assert_eq!(record.base_branch.as_str(), "develop");
        assert_eq!(record.base_branch_sha, Some(sha("d1")));
        assert_eq!(record.parent_sha, Some(sha("d1")));
        assert_eq!(record.sha, sha("s2"));
    }

    #[test]
    fn missing_base_writes_empty_base_shas() {
        let resolver = Resolver(HashMap::new());
        let mut cache = RepoCache::new("acme/widgets", None);
        let record =
            set_branch_new_commit(&mut cache, &resolver, &name("b"), &name("gone"), &sha("s1"))
                .unwrap();
        assert_eq!(record.base_branch_sha, None);
        assert_eq!(record.parent_sha, None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn resolver_error_leaves_cache_untouched() {
        let mut cache = RepoCache::new("acme/widgets", None);
        cache.upsert(BranchCache {
            is_conflicted: true,
            ..BranchCache::fresh(name("b"), name("main"), sha("old"), None)
        });
        let before = cache.clone();

        let err = set_branch_new_commit(&mut cache, &Broken, &name("b"), &name("main"), &sha("s1"))
            .unwrap_err();
        assert!(matches!(err, CacheError::Git(_)));
        assert_eq!(cache, before);
    }
}
