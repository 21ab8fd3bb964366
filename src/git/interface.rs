//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to git. All repository reads and
//! writes flow through [`Git`], which returns strong types and normalizes
//! libgit2 failures into [`GitError`] categories.
//!
//! # Error Handling
//!
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::BranchNotFound`]: A branch needed by the operation is missing
//! - [`GitError::MergeConflict`]: A local merge stopped on conflicts
//! - [`GitError::PushRejected`]: The remote refused a ref update
//!
//! # Example
//!
//! ```ignore
//! use depbot::git::{Git, WorkingCopy};
//! use depbot::core::types::BranchName;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let main = BranchName::new("main")?;
//! let branch = BranchName::new("depbot/serde-1.x")?;
//! if git.is_branch_behind_base(&branch, &main)? {
//!     println!("needs rebase");
//! }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::working_copy::{CommitFilesConfig, CommitResolver, FileChange, WorkingCopy};
use crate::core::types::{BranchName, CommitSha, GitAuthor, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// A branch needed by the operation does not exist.
    #[error("branch not found: {branch}")]
    BranchNotFound {
        /// The missing branch
        branch: String,
    },

    /// The configured remote does not exist.
    #[error("remote not found: {remote}")]
    RemoteNotFound {
        /// The remote name
        remote: String,
    },

    /// HEAD is detached where a branch is required.
    #[error("HEAD is detached")]
    DetachedHead,

    /// Merging stopped on conflicts; nothing was written.
    #[error("merging {branch} produced conflicts")]
    MergeConflict {
        /// The branch being merged in
        branch: String,
    },

    /// The remote rejected a pushed ref.
    #[error("push of {refname} rejected: {message}")]
    PushRejected {
        /// The ref that was pushed
        refname: String,
        /// Reason reported by the remote
        message: String,
    },

    /// A file path is not representable.
    #[error("invalid path in change set: {path}")]
    InvalidPath {
        /// The offending path
        path: String,
    },

    /// A value coming out of git failed validation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    fn internal(context: &str, err: git2::Error) -> Self {
        GitError::Internal {
            message: format!("{}: {}", context, err.message()),
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Identity and remote settings for a working copy.
#[derive(Debug, Clone)]
pub struct GitOptions {
    /// Remote branches are resolved against and pushed to.
    pub remote: String,
    /// Identity used for bot commits.
    pub author: GitAuthor,
    /// Commit authors that do not count as external modification.
    pub ignored_authors: Vec<String>,
    /// Token for authenticated pushes (HTTP remotes).
    pub token: Option<String>,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            author: GitAuthor::bot_default(),
            ignored_authors: Vec::new(),
            token: None,
        }
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with git. No other module
/// imports `git2`.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    options: GitOptions,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .field("remote", &self.options.remote)
            .field("author", &self.options.author)
            .field("has_token", &self.options.token.is_some())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path with default options.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Self::open_with(path, GitOptions::default())
    }

    /// Open a repository with explicit identity and remote settings.
    pub fn open_with(path: &Path, options: GitOptions) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo, options })
    }

    /// Path to the `.git` directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Path to the working directory.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    /// The options this working copy was opened with.
    pub fn options(&self) -> &GitOptions {
        &self.options
    }

    /// URL of the configured remote, if it exists.
    pub fn remote_url(&self) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(&self.options.remote) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal("find remote", e)),
        }
    }

    /// Name of the checked-out branch, or `None` when HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::internal("read HEAD", e)),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        match head.shorthand() {
            Some(name) => Ok(Some(BranchName::new(name)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a branch to a commit id: local branch first, then remote-tracking.
    fn resolve_branch(&self, branch: &BranchName) -> Result<Option<git2::Oid>, GitError> {
        for refname in [branch.local_ref(), branch.remote_ref(&self.options.remote)] {
            match self.repo.refname_to_id(&refname) {
                Ok(oid) => return Ok(Some(oid)),
                Err(e) if e.code() == git2::ErrorCode::NotFound => continue,
                Err(e) => return Err(GitError::internal(&refname, e)),
            }
        }
        Ok(None)
    }

    fn require_branch(&self, branch: &BranchName) -> Result<git2::Oid, GitError> {
        self.resolve_branch(branch)?
            .ok_or_else(|| GitError::BranchNotFound {
                branch: branch.to_string(),
            })
    }

    fn require_commit(&self, branch: &BranchName) -> Result<git2::Commit<'_>, GitError> {
        let oid = self.require_branch(branch)?;
        self.repo
            .find_commit(oid)
            .map_err(|e| GitError::internal(branch.as_str(), e))
    }

    fn to_sha(oid: git2::Oid) -> Result<CommitSha, GitError> {
        Ok(CommitSha::new(oid.to_string())?)
    }

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        git2::Signature::now(&self.options.author.name, &self.options.author.email)
            .map_err(|e| GitError::internal("build signature", e))
    }

    fn is_bot_or_ignored(&self, email: &str) -> bool {
        self.options.author.matches_email(email)
            || self
                .options
                .ignored_authors
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(email.trim()))
    }

    // =========================================================================
    // Tree Building
    // =========================================================================

    /// Apply file changes on top of `base_tree` and write the resulting tree.
    fn build_tree(
        &self,
        base_tree: &git2::Tree<'_>,
        files: &[FileChange],
    ) -> Result<git2::Oid, GitError> {
        let mut index = git2::Index::new()?;
        index.read_tree(base_tree)?;

        for change in files {
            let path = change.path();
            if path.is_empty() || path.starts_with('/') || path.split('/').any(|c| c == "..") {
                return Err(GitError::InvalidPath {
                    path: path.to_string(),
                });
            }
            match change {
                FileChange::Addition { contents, .. } => {
                    let blob = self.repo.blob(contents)?;
                    let entry = git2::IndexEntry {
                        ctime: git2::IndexTime::new(0, 0),
                        mtime: git2::IndexTime::new(0, 0),
                        dev: 0,
                        ino: 0,
                        mode: 0o100644,
                        uid: 0,
                        gid: 0,
                        file_size: index_file_size(contents.len()),
                        id: blob,
                        flags: 0,
                        flags_extended: 0,
                        path: path.as_bytes().to_vec(),
                    };
                    index.add(&entry)?;
                }
                FileChange::Deletion { .. } => {
                    // remove_path is a no-op for paths absent from the index
                    index.remove_path(Path::new(path))?;
                }
            }
        }

        Ok(index.write_tree_to(&self.repo)?)
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// Push refspecs to the configured remote, failing on any rejected ref.
    fn push(&self, refspecs: &[String]) -> Result<(), GitError> {
        let mut remote = match self.repo.find_remote(&self.options.remote) {
            Ok(remote) => remote,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                return Err(GitError::RemoteNotFound {
                    remote: self.options.remote.clone(),
                })
            }
            Err(e) => return Err(GitError::internal("find remote", e)),
        };

        let mut rejected: Option<(String, String)> = None;
        {
            let mut callbacks = git2::RemoteCallbacks::new();
            if let Some(token) = self.options.token.clone() {
                callbacks.credentials(move |_url, _username, _allowed| {
                    git2::Cred::userpass_plaintext("x-access-token", &token)
                });
            }
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejected = Some((refname.to_string(), message.to_string()));
                }
                Ok(())
            });

            let mut push_options = git2::PushOptions::new();
            push_options.remote_callbacks(callbacks);

            let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
            debug!(remote = %self.options.remote, refspecs = ?specs, "pushing");
            remote
                .push(&specs, Some(&mut push_options))
                .map_err(|e| GitError::internal("push", e))?;
        }

        match rejected {
            Some((refname, message)) => Err(GitError::PushRejected { refname, message }),
            None => Ok(()),
        }
    }

    fn has_remote(&self) -> Result<bool, GitError> {
        Ok(self.remote_url()?.is_some())
    }

    /// Make the working tree match HEAD.
    fn sync_worktree(&self) -> Result<(), GitError> {
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(|e| GitError::internal("checkout", e))
    }
}

/// Index entries store sizes as `u32`; larger files saturate.
fn index_file_size(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl CommitResolver for Git {
    fn branch_commit(&self, branch: &BranchName) -> Result<Option<CommitSha>, GitError> {
        self.resolve_branch(branch)?.map(Self::to_sha).transpose()
    }
}

impl WorkingCopy for Git {
    fn branch_exists(&self, branch: &BranchName) -> Result<bool, GitError> {
        Ok(self.resolve_branch(branch)?.is_some())
    }

    fn is_branch_behind_base(
        &self,
        branch: &BranchName,
        base: &BranchName,
    ) -> Result<bool, GitError> {
        let branch_oid = self.require_branch(branch)?;
        let base_oid = self.require_branch(base)?;
        if branch_oid == base_oid {
            return Ok(false);
        }

        let contains_base = self
            .repo
            .graph_descendant_of(branch_oid, base_oid)
            .map_err(|e| GitError::internal("ancestry", e))?;
        let behind = !contains_base;
        debug!(branch = %branch, base = %base, behind, "computed behind-base");
        Ok(behind)
    }

    fn is_branch_modified(&self, branch: &BranchName, base: &BranchName) -> Result<bool, GitError> {
        let branch_oid = self.require_branch(branch)?;
        let base_oid = self.require_branch(base)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(branch_oid)?;
        revwalk.hide(base_oid)?;

        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let author = commit.author();
            let email = author.email().unwrap_or("");
            if !self.is_bot_or_ignored(email) {
                debug!(branch = %branch, commit = %commit.id(), author = email, "branch modified");
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn is_branch_conflicted(&self, base: &BranchName, branch: &BranchName) -> Result<bool, GitError> {
        let base_commit = self.require_commit(base)?;
        let branch_commit = self.require_commit(branch)?;

        let index = self
            .repo
            .merge_commits(&branch_commit, &base_commit, None)
            .map_err(|e| GitError::internal("merge", e))?;
        let conflicted = index.has_conflicts();
        debug!(branch = %branch, base = %base, conflicted, "computed conflict state");
        Ok(conflicted)
    }

    fn checkout_branch(&self, branch: &BranchName) -> Result<CommitSha, GitError> {
        let local_ref = branch.local_ref();
        if self.repo.refname_to_id(&local_ref).is_err() {
            let remote_ref = branch.remote_ref(&self.options.remote);
            let oid = self
                .repo
                .refname_to_id(&remote_ref)
                .map_err(|_| GitError::BranchNotFound {
                    branch: branch.to_string(),
                })?;
            let commit = self.repo.find_commit(oid)?;
            let mut local = self.repo.branch(branch.as_str(), &commit, false)?;
            local.set_upstream(Some(&format!("{}/{}", self.options.remote, branch)))?;
        }

        self.repo
            .set_head(&local_ref)
            .map_err(|e| GitError::internal("set HEAD", e))?;
        self.sync_worktree()?;

        let oid = self.repo.refname_to_id(&local_ref)?;
        Self::to_sha(oid)
    }

    fn commit_and_push(&self, config: &CommitFilesConfig) -> Result<Option<CommitSha>, GitError> {
        let base_commit = self.require_commit(&config.base_branch)?;
        let base_tree = base_commit.tree()?;
        let tree_oid = self.build_tree(&base_tree, &config.files)?;

        if tree_oid == base_tree.id() {
            debug!(branch = %config.branch_name, "no changes relative to base, skipping commit");
            return Ok(None);
        }

        if !config.force {
            if let Some(existing) = self.resolve_branch(&config.branch_name)? {
                let existing = self.repo.find_commit(existing)?;
                let same_parent = existing.parent_id(0).ok() == Some(base_commit.id());
                if same_parent && existing.tree_id() == tree_oid {
                    debug!(branch = %config.branch_name, "branch already up to date, skipping commit");
                    return Ok(None);
                }
            }
        }

        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self.signature()?;
        let commit_oid = self.repo.commit(
            None,
            &signature,
            &signature,
            &config.message,
            &tree,
            &[&base_commit],
        )?;

        let local_ref = config.branch_name.local_ref();
        self.repo.reference(
            &local_ref,
            commit_oid,
            true,
            &format!("depbot: commit {}", config.branch_name),
        )?;

        if self.current_branch()?.as_ref() == Some(&config.branch_name) {
            self.sync_worktree()?;
        }

        self.push(&[format!("+{local_ref}:{local_ref}")])?;
        Ok(Some(Self::to_sha(commit_oid)?))
    }

    fn merge_to_local(&self, branch: &BranchName) -> Result<(), GitError> {
        let current = self.current_branch()?.ok_or(GitError::DetachedHead)?;
        let theirs = self.require_commit(branch)?;
        let annotated = self.repo.find_annotated_commit(theirs.id())?;
        let (analysis, _) = self
            .repo
            .merge_analysis(&[&annotated])
            .map_err(|e| GitError::internal("merge analysis", e))?;

        if analysis.is_up_to_date() {
            return Ok(());
        }

        let mut head_ref = self.repo.find_reference(&current.local_ref())?;
        if analysis.is_fast_forward() {
            head_ref.set_target(theirs.id(), &format!("depbot: fast-forward to {branch}"))?;
            return self.sync_worktree();
        }

        let ours = self.require_commit(&current)?;
        let mut index = self
            .repo
            .merge_commits(&ours, &theirs, None)
            .map_err(|e| GitError::internal("merge", e))?;
        if index.has_conflicts() {
            return Err(GitError::MergeConflict {
                branch: branch.to_string(),
            });
        }

        let tree_oid = index.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self.signature()?;
        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("Merge branch '{branch}' into {current}"),
            &tree,
            &[&ours, &theirs],
        )?;
        self.sync_worktree()
    }

    fn merge_and_push(&self, branch: &BranchName) -> Result<(), GitError> {
        self.merge_to_local(branch)?;
        let current = self.current_branch()?.ok_or(GitError::DetachedHead)?;
        let local_ref = current.local_ref();
        self.push(&[format!("{local_ref}:{local_ref}")])
    }

    fn delete_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        match self.repo.find_branch(branch.as_str(), git2::BranchType::Local) {
            Ok(mut local) => local
                .delete()
                .map_err(|e| GitError::internal("delete local branch", e))?,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {}
            Err(e) => return Err(GitError::internal("find branch", e)),
        }

        let remote_ref = branch.remote_ref(&self.options.remote);
        if self.has_remote()? && self.repo.refname_to_id(&remote_ref).is_ok() {
            self.push(&[format!(":{}", branch.local_ref())])?;
            // Older libgit2 versions leave the tracking ref behind
            if let Ok(mut tracking) = self.repo.find_reference(&remote_ref) {
                tracking.delete()?;
            }
        }

        debug!(branch = %branch, "deleted branch");
        Ok(())
    }

    fn get_file_list(&self) -> Result<Vec<String>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(GitError::internal("read HEAD", e)),
        };
        let tree = head.peel_to_tree()?;

        let mut files = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.push(format!("{root}{name}"));
                }
            }
            git2::TreeWalkResult::Ok
        })?;
        files.sort();
        Ok(files)
    }
}
