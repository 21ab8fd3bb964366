//! platform::traits
//!
//! The `Platform` trait and its optional capability traits.
//!
//! # Design
//!
//! `Platform` is async because every operation is network I/O. Required
//! operations live on the trait itself. Optional ones live on small
//! separate traits, reached through accessors that return `None` when the
//! adapter does not support them:
//!
//! ```ignore
//! if let Some(alerts) = platform.vulnerability_alerts() {
//!     for alert in alerts.get_vulnerability_alerts().await? {
//!         println!("{} {}", alert.package_name, alert.vulnerable_range);
//!     }
//! }
//! ```
//!
//! Callers check support before calling; nothing is emulated here.
//!
//! # Errors
//!
//! Every failure is one of the [`PlatformError`] kinds, so retry and
//! backoff can be decided per kind without knowing the provider.

use async_trait::async_trait;
use thiserror::Error;

use super::capabilities::{Capability, CapabilitySet};
use super::types::{
    AutodiscoverConfig, BranchStatus, BranchStatusConfig, CreatePrConfig, EnsureCommentConfig,
    EnsureCommentRemoval, EnsureIssueConfig, EnsureIssueResult, FileOwnerRule, FindPrConfig,
    Issue, MergePrConfig, PlatformParams, PlatformResult, Pr, ReattemptAutomergeConfig,
    RepoParams, RepoResult, UpdatePrConfig, VulnerabilityAlert,
};
use crate::core::types::CommitSha;
use crate::git::CommitFilesConfig;

/// Errors from platform operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Credentials missing, invalid, expired, or lacking permission.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The provider is throttling requests.
    #[error("rate limited{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Seconds until the limit resets, when the provider says.
        retry_after: Option<u64>,
    },

    /// The resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with remote state or was rejected as invalid.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Network failure, timeout, or provider-side error.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl PlatformError {
    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. } | PlatformError::Transient(_)
        )
    }
}

/// Shorten `body` to at most `max` bytes on a character boundary.
pub fn smart_truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

/// The uniform contract every hosting provider adapter implements.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one adapter can serve
/// concurrent repository passes.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Provider name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Optional operations this adapter supports.
    fn capabilities(&self) -> &CapabilitySet;

    fn supports(&self, cap: Capability) -> bool {
        self.capabilities().has(cap)
    }

    /// Longest PR body the provider accepts.
    fn max_body_length(&self) -> usize;

    /// Adjust a rendered PR body for this provider.
    fn massage_markdown(&self, body: &str) -> String {
        smart_truncate(body, self.max_body_length())
    }

    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------

    /// Validate credentials and endpoint. Repeated calls return the first result.
    async fn init_platform(&self, params: PlatformParams) -> Result<PlatformResult, PlatformError>;

    /// Select the repository later calls operate on.
    async fn init_repo(&self, params: RepoParams) -> Result<RepoResult, PlatformError>;

    /// Repositories visible to the bot, filtered and sorted per `config`.
    async fn get_repos(&self, config: &AutodiscoverConfig) -> Result<Vec<String>, PlatformError>;

    // -------------------------------------------------------------------------
    // Pull requests
    // -------------------------------------------------------------------------

    /// PRs opened by the bot in the current repository.
    async fn get_pr_list(&self) -> Result<Vec<Pr>, PlatformError>;

    /// First PR matching `config`.
    async fn find_pr(&self, config: &FindPrConfig) -> Result<Option<Pr>, PlatformError>;

    async fn get_pr(&self, number: u64) -> Result<Option<Pr>, PlatformError>;

    /// The open PR for `branch`, optionally restricted to a target branch.
    async fn get_branch_pr(
        &self,
        branch: &str,
        target_branch: Option<&str>,
    ) -> Result<Option<Pr>, PlatformError>;

    async fn create_pr(&self, config: CreatePrConfig) -> Result<Pr, PlatformError>;

    async fn update_pr(&self, config: UpdatePrConfig) -> Result<(), PlatformError>;

    /// Merge a PR. `Ok(false)` means the provider declined the merge.
    async fn merge_pr(&self, config: &MergePrConfig) -> Result<bool, PlatformError>;

    async fn add_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), PlatformError>;

    async fn add_assignees(&self, number: u64, assignees: &[String]) -> Result<(), PlatformError>;

    async fn add_label(&self, number: u64, label: &str) -> Result<(), PlatformError>;

    async fn delete_label(&self, number: u64, label: &str) -> Result<(), PlatformError>;

    // -------------------------------------------------------------------------
    // Branch status
    // -------------------------------------------------------------------------

    async fn set_branch_status(&self, config: &BranchStatusConfig) -> Result<(), PlatformError>;

    /// Aggregate status of all checks on the branch head.
    async fn get_branch_status(
        &self,
        branch: &str,
        internal_checks_as_success: bool,
    ) -> Result<BranchStatus, PlatformError>;

    /// State of a single named check, if present.
    async fn get_branch_status_check(
        &self,
        branch: &str,
        context: &str,
    ) -> Result<Option<BranchStatus>, PlatformError>;

    // -------------------------------------------------------------------------
    // Issues and comments
    // -------------------------------------------------------------------------

    async fn find_issue(&self, title: &str) -> Result<Option<Issue>, PlatformError>;

    /// Issues opened by the bot.
    async fn get_issue_list(&self) -> Result<Vec<Issue>, PlatformError>;

    /// Issue by number. With `use_cache`, a copy fetched earlier in this
    /// repository session may be returned instead of asking the provider.
    async fn get_issue(
        &self,
        number: u64,
        use_cache: bool,
    ) -> Result<Option<Issue>, PlatformError>;

    /// Create or update an issue. `Ok(None)` means nothing had to change.
    async fn ensure_issue(
        &self,
        config: &EnsureIssueConfig,
    ) -> Result<Option<EnsureIssueResult>, PlatformError>;

    /// Close every open bot issue with `title`.
    async fn ensure_issue_closing(&self, title: &str) -> Result<(), PlatformError>;

    /// Add or replace a comment. Returns `true` if a comment was written.
    async fn ensure_comment(&self, config: &EnsureCommentConfig) -> Result<bool, PlatformError>;

    async fn ensure_comment_removal(
        &self,
        config: &EnsureCommentRemoval,
    ) -> Result<(), PlatformError>;

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Raw file content at an optional repository and ref. `None` if absent.
    async fn get_raw_file(
        &self,
        file_name: &str,
        repo: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, PlatformError>;

    /// Parsed JSON file content.
    ///
    /// Content that is not valid JSON is reported as [`PlatformError::Conflict`].
    async fn get_json_file(
        &self,
        file_name: &str,
        repo: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Option<serde_json::Value>, PlatformError> {
        match self.get_raw_file(file_name, repo, git_ref).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                PlatformError::Conflict(format!("{file_name} is not valid JSON: {e}"))
            }),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Optional capabilities
    // -------------------------------------------------------------------------

    fn vulnerability_alerts(&self) -> Option<&dyn VulnerabilityAlerts> {
        None
    }

    fn group_members(&self) -> Option<&dyn GroupMembers> {
        None
    }

    fn code_owner_rules(&self) -> Option<&dyn CodeOwnerRules> {
        None
    }

    fn automerge_reattempt(&self) -> Option<&dyn AutomergeReattempt> {
        None
    }

    fn branch_force_rebase(&self) -> Option<&dyn BranchForceRebase> {
        None
    }

    fn autoclosed_pr_reuse(&self) -> Option<&dyn AutoclosedPrReuse> {
        None
    }

    fn user_availability(&self) -> Option<&dyn UserAvailability> {
        None
    }

    fn label_limit(&self) -> Option<&dyn LabelLimit> {
        None
    }

    fn pr_refresh(&self) -> Option<&dyn PrRefresh> {
        None
    }

    fn platform_commit(&self) -> Option<&dyn PlatformCommit> {
        None
    }

    fn fork_sync(&self) -> Option<&dyn ForkSync> {
        None
    }
}

/// Security advisories for the current repository.
#[async_trait]
pub trait VulnerabilityAlerts: Send + Sync {
    async fn get_vulnerability_alerts(&self) -> Result<Vec<VulnerabilityAlert>, PlatformError>;
}

/// Expansion of group handles into members.
#[async_trait]
pub trait GroupMembers: Send + Sync {
    /// Replace group entries with their members; plain users pass through.
    async fn expand_group_members(
        &self,
        reviewers_or_assignees: &[String],
    ) -> Result<Vec<String>, PlatformError>;
}

/// Provider-specific CODEOWNERS parsing.
pub trait CodeOwnerRules: Send + Sync {
    fn extract_rules_from_code_owners_lines(&self, lines: &[String]) -> Vec<FileOwnerRule>;
}

#[async_trait]
pub trait AutomergeReattempt: Send + Sync {
    async fn reattempt_platform_automerge(
        &self,
        config: &ReattemptAutomergeConfig,
    ) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait BranchForceRebase: Send + Sync {
    /// Whether protection rules require `branch` targets to be up to date.
    async fn get_branch_force_rebase(&self, branch: &str) -> Result<bool, PlatformError>;
}

#[async_trait]
pub trait AutoclosedPrReuse: Send + Sync {
    /// Reopen `pr` if the provider closed it automatically. `None` if not reusable.
    async fn try_reuse_autoclosed_pr(&self, pr: &Pr) -> Result<Option<Pr>, PlatformError>;
}

#[async_trait]
pub trait UserAvailability: Send + Sync {
    async fn filter_unavailable_users(&self, users: &[String]) -> Result<Vec<String>, PlatformError>;
}

pub trait LabelLimit: Send + Sync {
    fn label_char_limit(&self) -> usize;
}

#[async_trait]
pub trait PrRefresh: Send + Sync {
    /// Re-read PR `number` from the provider and replace any cached copy.
    async fn refresh_pr(&self, number: u64) -> Result<(), PlatformError>;
}

/// Commits created through the provider API instead of a local push.
#[async_trait]
pub trait PlatformCommit: Send + Sync {
    /// Commit `config.files` on top of the base branch head and point the
    /// branch at the result. `None` when the branch already holds that tree
    /// and `config.force` is unset.
    async fn commit_files(
        &self,
        config: &CommitFilesConfig,
    ) -> Result<Option<CommitSha>, PlatformError>;
}

#[async_trait]
pub trait ForkSync: Send + Sync {
    async fn sync_fork_with_upstream(&self, base_branch: &str) -> Result<(), PlatformError>;
}
