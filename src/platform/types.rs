//! platform::types
//!
//! Request and response types shared by every platform adapter.

use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::labels::LabelUpdate;
use crate::core::types::{CommitSha, Fingerprint};

// =============================================================================
// Pull requests
// =============================================================================

/// Remote state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// State filter for PR lookups.
///
/// `NotOpen` covers both closed and merged PRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrStateFilter {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "!open")]
    NotOpen,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl PrStateFilter {
    /// Whether a PR in `state` passes this filter.
    ///
    /// # Example
    ///
    /// ```
    /// use depbot::platform::{PrState, PrStateFilter};
    ///
    /// assert!(PrStateFilter::NotOpen.matches(PrState::Merged));
    /// assert!(!PrStateFilter::NotOpen.matches(PrState::Open));
    /// assert!(!PrStateFilter::Closed.matches(PrState::Merged));
    /// ```
    pub fn matches(&self, state: PrState) -> bool {
        match self {
            PrStateFilter::Open => state == PrState::Open,
            PrStateFilter::Closed => state == PrState::Closed,
            PrStateFilter::NotOpen => state != PrState::Open,
            PrStateFilter::All => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrStateFilter::Open => "open",
            PrStateFilter::Closed => "closed",
            PrStateFilter::NotOpen => "!open",
            PrStateFilter::All => "all",
        }
    }
}

impl FromStr for PrStateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PrStateFilter::Open),
            "closed" => Ok(PrStateFilter::Closed),
            "!open" => Ok(PrStateFilter::NotOpen),
            "all" => Ok(PrStateFilter::All),
            other => Err(format!(
                "invalid PR state filter '{other}', must be one of: open, closed, !open, all"
            )),
        }
    }
}

impl std::fmt::Display for PrStateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic metadata embedded in PR bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrDebugData {
    pub created_in_ver: String,
    pub updated_in_ver: String,
    pub target_branch: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Ticked rebase checkbox in a PR body.
pub const REBASE_CHECKBOX_CHECKED: &str = "- [x] <!-- rebase-check -->";
const REBASE_CHECKBOX_UNCHECKED: &str = "- [ ] <!-- rebase-check -->";

/// Hidden comment carrying base64 JSON [`PrDebugData`].
pub const DEBUG_DATA_MARKER: &str = "<!--depbot-debug:";
/// Hidden comment carrying the hash of the config that rendered the body.
pub const CONFIG_HASH_MARKER: &str = "<!--config-hash:";

/// Structure extracted from a PR body for drift detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrBodyStruct {
    /// Hash of the bot-authored part of the body.
    pub hash: String,
    pub raw_config_hash: Option<String>,
    #[serde(default)]
    pub rebase_requested: bool,
    pub debug_data: Option<PrDebugData>,
}

impl PrBodyStruct {
    /// Parse a PR body as the provider returned it.
    ///
    /// The hash covers what the bot rendered: hidden metadata comments are
    /// dropped and the rebase checkbox is hashed unticked, so a user ticking
    /// it or a version bump in the debug data does not look like drift.
    pub fn from_body(body: &str) -> Self {
        let (without_debug, debug) = take_marker(body, DEBUG_DATA_MARKER);
        let (stripped, config_hash) = take_marker(&without_debug, CONFIG_HASH_MARKER);
        let authored = stripped.replace(REBASE_CHECKBOX_CHECKED, REBASE_CHECKBOX_UNCHECKED);

        Self {
            hash: Fingerprint::compute([authored.trim()]).as_str().to_string(),
            raw_config_hash: config_hash,
            rebase_requested: body.contains(REBASE_CHECKBOX_CHECKED),
            debug_data: debug.as_deref().and_then(PrDebugData::decode),
        }
    }
}

impl PrDebugData {
    /// Decode the base64 JSON payload of a debug marker.
    pub fn decode(payload: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// The hidden comment embedding this data in a PR body.
    pub fn to_marker(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        format!(
            "{DEBUG_DATA_MARKER}{}-->",
            base64::engine::general_purpose::STANDARD.encode(json)
        )
    }
}

/// Remove the first `<marker>payload-->` comment, returning the rest and the payload.
fn take_marker(body: &str, marker: &str) -> (String, Option<String>) {
    let Some(start) = body.find(marker) else {
        return (body.to_string(), None);
    };
    let payload_start = start + marker.len();
    let Some(len) = body[payload_start..].find("-->") else {
        return (body.to_string(), None);
    };
    let payload = body[payload_start..payload_start + len].to_string();
    let rest = format!("{}{}", &body[..start], &body[payload_start + len + 3..]);
    (rest, Some(payload))
}

/// Snapshot of a remote pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pr {
    pub number: u64,
    pub source_branch: String,
    pub target_branch: Option<String>,
    pub state: PrState,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub has_assignees: bool,
    pub sha: Option<CommitSha>,
    pub body_struct: Option<PrBodyStruct>,
    #[serde(default)]
    pub is_draft: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Provider policy currently blocking a merge.
    pub cannot_merge_reason: Option<String>,
    /// Repository the source branch lives in, for forks.
    pub source_repo: Option<String>,
}

impl Pr {
    /// A minimal open PR, for adapters and tests to fill in.
    pub fn new(number: u64, source_branch: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            number,
            source_branch: source_branch.into(),
            target_branch: None,
            state: PrState::Open,
            title: title.into(),
            labels: Vec::new(),
            reviewers: Vec::new(),
            has_assignees: false,
            sha: None,
            body_struct: None,
            is_draft: false,
            created_at: None,
            closed_at: None,
            cannot_merge_reason: None,
            source_repo: None,
        }
    }
}

/// Lookup criteria for [`Platform::find_pr`](super::Platform::find_pr).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindPrConfig {
    pub branch_name: String,
    pub pr_title: Option<String>,
    pub state: PrStateFilter,
    pub target_branch: Option<String>,
    /// Also match PRs not authored by the bot.
    pub include_other_authors: bool,
    /// Bypass any adapter-side PR list cache.
    pub refresh_cache: bool,
}

impl FindPrConfig {
    pub fn new(branch_name: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: PrStateFilter) -> Self {
        self.state = state;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.pr_title = Some(title.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_branch = Some(target.into());
        self
    }

    /// Whether `pr` satisfies every given criterion.
    pub fn matches(&self, pr: &Pr) -> bool {
        if pr.source_branch != self.branch_name {
            return false;
        }
        if let Some(title) = &self.pr_title {
            if &pr.title != title {
                return false;
            }
        }
        if let Some(target) = &self.target_branch {
            if pr.target_branch.as_ref() != Some(target) {
                return false;
            }
        }
        self.state.matches(pr.state)
    }
}

/// Merge strategy requested for a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Let the provider pick its default.
    #[default]
    Auto,
    FastForward,
    MergeCommit,
    Rebase,
    Squash,
}

/// Provider-specific PR options the bot may request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformPrOptions {
    pub auto_approve: bool,
    pub automerge_strategy: Option<MergeStrategy>,
    pub use_platform_automerge: bool,
    pub fork_mode_disallow_maintainer_edits: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatePrConfig {
    pub source_branch: String,
    pub target_branch: String,
    pub pr_title: String,
    pub pr_body: String,
    pub labels: Vec<String>,
    pub draft: bool,
    pub milestone: Option<u64>,
    pub options: PlatformPrOptions,
}

/// Open/closed state used to close or reopen issues and PRs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueState::Open => write!(f, "open"),
            IssueState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePrConfig {
    pub number: u64,
    pub pr_title: String,
    pub pr_body: Option<String>,
    pub state: Option<IssueState>,
    pub target_branch: Option<String>,
    /// Label changes, either a full set or add/remove lists.
    pub labels: Option<LabelUpdate>,
    pub options: PlatformPrOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePrConfig {
    pub id: u64,
    pub branch_name: Option<String>,
    pub strategy: Option<MergeStrategy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReattemptAutomergeConfig {
    pub number: u64,
    pub options: PlatformPrOptions,
}

// =============================================================================
// Branch status
// =============================================================================

/// Aggregate (or single-check) branch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Green,
    Yellow,
    Red,
}

impl std::fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchStatus::Green => write!(f, "green"),
            BranchStatus::Yellow => write!(f, "yellow"),
            BranchStatus::Red => write!(f, "red"),
        }
    }
}

/// State of one status check as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Success,
    Pending,
    Failure,
    Error,
    /// Neutral or skipped; does not block.
    Skipped,
}

impl From<BranchStatus> for CheckState {
    fn from(status: BranchStatus) -> Self {
        match status {
            BranchStatus::Green => CheckState::Success,
            BranchStatus::Yellow => CheckState::Pending,
            BranchStatus::Red => CheckState::Failure,
        }
    }
}

impl From<CheckState> for BranchStatus {
    fn from(state: CheckState) -> Self {
        match state {
            CheckState::Success | CheckState::Skipped => BranchStatus::Green,
            CheckState::Pending => BranchStatus::Yellow,
            CheckState::Failure | CheckState::Error => BranchStatus::Red,
        }
    }
}

/// One named status check on a branch head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub context: String,
    pub state: CheckState,
}

impl StatusCheck {
    pub fn new(context: impl Into<String>, state: CheckState) -> Self {
        Self {
            context: context.into(),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStatusConfig {
    pub branch_name: String,
    pub context: String,
    pub description: String,
    pub state: BranchStatus,
    pub url: Option<String>,
}

// =============================================================================
// Issues and comments
// =============================================================================

/// Snapshot of a remote issue. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<IssueState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureIssueConfig {
    pub title: String,
    /// Older title to adopt and rename.
    pub reuse_title: Option<String>,
    pub body: String,
    pub labels: Vec<String>,
    /// Never reopen or recreate a closed issue with this title.
    pub once: bool,
    /// Reopen the most recent closed issue instead of creating a new one.
    pub should_reopen: bool,
    pub confidential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsureIssueResult {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureCommentConfig {
    pub number: u64,
    /// Topic heading; comments with the same topic are replaced.
    pub topic: Option<String>,
    pub content: String,
}

impl EnsureCommentConfig {
    /// The comment body as posted.
    ///
    /// ```
    /// use depbot::platform::EnsureCommentConfig;
    ///
    /// let config = EnsureCommentConfig {
    ///     number: 7,
    ///     topic: Some("Edited/Blocked Notification".into()),
    ///     content: "Depbot will not rebase this PR.".into(),
    /// };
    /// assert_eq!(
    ///     config.body(),
    ///     "### Edited/Blocked Notification\n\nDepbot will not rebase this PR."
    /// );
    /// ```
    pub fn body(&self) -> String {
        match &self.topic {
            Some(topic) => format!("### {}\n\n{}", topic, self.content),
            None => self.content.clone(),
        }
    }
}

/// Whether an existing comment body belongs to `topic`.
pub fn comment_has_topic(body: &str, topic: &str) -> bool {
    body.starts_with(&format!("### {topic}\n\n"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureCommentRemoval {
    ByTopic { number: u64, topic: String },
    ByContent { number: u64, content: String },
}

impl EnsureCommentRemoval {
    pub fn number(&self) -> u64 {
        match self {
            EnsureCommentRemoval::ByTopic { number, .. }
            | EnsureCommentRemoval::ByContent { number, .. } => *number,
        }
    }

    /// Whether an existing comment body is targeted for removal.
    pub fn matches(&self, body: &str) -> bool {
        match self {
            EnsureCommentRemoval::ByTopic { topic, .. } => comment_has_topic(body, topic),
            EnsureCommentRemoval::ByContent { content, .. } => body.trim() == content.trim(),
        }
    }
}

// =============================================================================
// Repositories
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoSortMethod {
    Alpha,
    Created,
    Updated,
    Size,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Filters for repository discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutodiscoverConfig {
    /// Keep repositories carrying at least one of these topics.
    pub topics: Vec<String>,
    pub sort: Option<RepoSortMethod>,
    pub order: Option<SortOrder>,
    pub include_mirrors: bool,
    /// Keep repositories under one of these owners/namespaces.
    pub namespaces: Vec<String>,
    pub projects: Vec<String>,
}

/// Credentials and endpoint given to `init_platform`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformParams {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub git_author: Option<String>,
}

/// Extra host authentication the rest of the bot must register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRule {
    pub host_type: Option<String>,
    pub match_host: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResult {
    /// Normalized endpoint, always ending in `/`.
    pub endpoint: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub git_author: Option<String>,
    pub host_rules: Vec<HostRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoParams {
    /// `owner/name`
    pub repository: String,
    pub endpoint: Option<String>,
    /// Treat PRs from any author as the bot's own.
    pub ignore_pr_author: bool,
    pub include_mirrors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoResult {
    pub default_branch: String,
    pub is_fork: bool,
    pub repo_fingerprint: Fingerprint,
}

// =============================================================================
// Optional capability payloads
// =============================================================================

/// A security advisory affecting one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityAlert {
    pub package_name: String,
    pub ecosystem: String,
    pub vulnerable_range: String,
    pub first_patched_version: Option<String>,
    pub severity: Option<String>,
    pub advisory_id: Option<String>,
}

/// One code-owner rule: a path pattern and its owners.
#[derive(Debug, Clone)]
pub struct FileOwnerRule {
    pub usernames: Vec<String>,
    pub pattern: String,
    /// Higher scores win; more specific patterns score higher.
    pub score: usize,
    matcher: Regex,
}

impl FileOwnerRule {
    /// Parse a CODEOWNERS line (`pattern @owner1 @owner2`).
    ///
    /// Returns `None` for blank lines, comments, and lines without owners.
    ///
    /// ```
    /// use depbot::platform::FileOwnerRule;
    ///
    /// let rule = FileOwnerRule::parse_line("docs/*.md @writers @alice").unwrap();
    /// assert_eq!(rule.usernames, vec!["@writers", "@alice"]);
    /// assert!(rule.matches("docs/intro.md"));
    /// assert!(!rule.matches("docs/deep/intro.md"));
    /// ```
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut parts = line.split_whitespace();
        let pattern = parts.next()?.to_string();
        let usernames: Vec<String> = parts.map(String::from).collect();
        if usernames.is_empty() {
            return None;
        }
        let matcher = Regex::new(&codeowners_regex(&pattern)).ok()?;
        Some(Self {
            usernames,
            score: pattern.len(),
            pattern,
            matcher,
        })
    }

    /// Whether a repository-relative path falls under this rule.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path.trim_start_matches('/'))
    }
}

impl PartialEq for FileOwnerRule {
    fn eq(&self, other: &Self) -> bool {
        self.usernames == other.usernames && self.pattern == other.pattern && self.score == other.score
    }
}

/// Translate a CODEOWNERS glob into an anchored regex.
fn codeowners_regex(pattern: &str) -> String {
    let anchored = pattern.starts_with('/') || pattern.trim_end_matches('/').contains('/');
    let directory = pattern.ends_with('/');
    let trimmed = pattern.trim_start_matches('/').trim_end_matches('/');

    let mut out = String::from("^");
    if !anchored {
        out.push_str("(?:.*/)?");
    }
    let chars: Vec<char> = trimmed.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 1;
                if chars.get(i + 1) == Some(&'/') {
                    i += 1;
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    if directory {
        out.push_str("/.*$");
    } else {
        out.push_str("(?:/.*)?$");
    }
    out
}
