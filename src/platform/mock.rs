//! platform::mock
//!
//! In-memory platform for deterministic testing.
//!
//! # Design
//!
//! `MockPlatform` keeps PRs, issues, comments, status checks, files, and
//! repositories in memory. Mutating calls are recorded as
//! [`MockOperation`]s, and any call can be made to fail with a chosen
//! [`PlatformError`] through [`FailOn`]. The supported capability set is
//! configurable, so capability-gated callers can be tested both ways.
//!
//! # Example
//!
//! ```
//! use depbot::platform::mock::MockPlatform;
//! use depbot::platform::{CreatePrConfig, FindPrConfig, Platform, PrStateFilter};
//!
//! # tokio_test::block_on(async {
//! let platform = MockPlatform::new();
//!
//! let pr = platform.create_pr(CreatePrConfig {
//!     source_branch: "depbot/serde-1.x".into(),
//!     target_branch: "main".into(),
//!     pr_title: "Update serde to v1.0.200".into(),
//!     ..Default::default()
//! }).await.unwrap();
//! assert_eq!(pr.number, 1);
//!
//! let found = platform
//!     .find_pr(&FindPrConfig::new("depbot/serde-1.x").with_state(PrStateFilter::Open))
//!     .await
//!     .unwrap();
//! assert_eq!(found.map(|p| p.number), Some(1));
//! # });
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::capabilities::{Capability, CapabilitySet};
use super::labels::reconcile_labels;
use super::status::aggregate_branch_status;
use super::traits::{
    AutoclosedPrReuse, AutomergeReattempt, BranchForceRebase, CodeOwnerRules, ForkSync,
    GroupMembers, LabelLimit, Platform, PlatformCommit, PlatformError, PrRefresh,
    UserAvailability, VulnerabilityAlerts,
};
use super::types::{
    AutodiscoverConfig, BranchStatus, BranchStatusConfig, CheckState, CreatePrConfig,
    EnsureCommentConfig, EnsureCommentRemoval, EnsureIssueConfig, EnsureIssueResult,
    FileOwnerRule, FindPrConfig, Issue, IssueState, MergePrConfig, PlatformParams,
    PlatformResult, Pr, PrState, PrStateFilter, ReattemptAutomergeConfig, RepoParams,
    RepoResult, RepoSortMethod, SortOrder, StatusCheck, UpdatePrConfig, VulnerabilityAlert,
};
use crate::core::config::DEFAULT_INTERNAL_CHECK_PREFIX;
use crate::core::types::{CommitSha, Fingerprint};
use crate::git::{CommitFilesConfig, FileChange};

const MOCK_ENDPOINT: &str = "https://mock.depbot.invalid/";
const AUTOCLOSED_SUFFIX: &str = " - autoclosed";

/// A repository known to the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRepo {
    /// `owner/name`
    pub name: String,
    pub id: u64,
    pub default_branch: String,
    pub is_fork: bool,
    pub is_mirror: bool,
    pub topics: Vec<String>,
    pub size: u64,
}

impl MockRepo {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
            default_branch: "main".to_string(),
            is_fork: false,
            is_mirror: false,
            topics: Vec::new(),
            size: 0,
        }
    }

    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// A stored comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockComment {
    pub id: u64,
    pub body: String,
}

/// Which call should fail, and with what.
#[derive(Debug, Clone)]
pub enum FailOn {
    InitPlatform(PlatformError),
    InitRepo(PlatformError),
    GetPrList(PlatformError),
    FindPr(PlatformError),
    CreatePr(PlatformError),
    UpdatePr(PlatformError),
    MergePr(PlatformError),
    GetBranchStatus(PlatformError),
    EnsureIssue(PlatformError),
    EnsureComment(PlatformError),
    GetRawFile(PlatformError),
    /// Every call fails.
    Any(PlatformError),
}

/// Recorded mutating operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    InitRepo { repository: String },
    CreatePr { source_branch: String, target_branch: String, title: String },
    UpdatePr { number: u64, title: String, state: Option<IssueState> },
    MergePr { number: u64 },
    AddReviewers { number: u64, reviewers: Vec<String> },
    AddAssignees { number: u64, assignees: Vec<String> },
    AddLabel { number: u64, label: String },
    DeleteLabel { number: u64, label: String },
    SetBranchStatus { branch: String, context: String, state: BranchStatus },
    CreateIssue { number: u64, title: String },
    UpdateIssue { number: u64, title: String, reopened: bool },
    CloseIssue { number: u64 },
    AddComment { number: u64, comment_id: u64 },
    UpdateComment { number: u64, comment_id: u64 },
    RemoveComment { number: u64, comment_id: u64 },
    ReattemptAutomerge { number: u64 },
    ReopenPr { number: u64 },
    RefreshPr { number: u64 },
    CommitFiles { branch: String, sha: String },
    SyncFork { base_branch: String },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FileKey {
    repo: Option<String>,
    git_ref: Option<String>,
    path: String,
}

/// Branch content held by the mock's commit store.
#[derive(Debug, Clone)]
struct MockBranch {
    sha: String,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone)]
struct StoredIssue {
    number: u64,
    title: String,
    body: String,
    state: IssueState,
    labels: Vec<String>,
}

impl StoredIssue {
    fn snapshot(&self) -> Issue {
        Issue {
            number: Some(self.number),
            title: Some(self.title.clone()),
            body: Some(self.body.clone()),
            state: Some(self.state),
        }
    }
}

#[derive(Debug)]
struct MockPlatformInner {
    prs: BTreeMap<u64, Pr>,
    pr_bodies: HashMap<u64, String>,
    assignees: HashMap<u64, Vec<String>>,
    issues: BTreeMap<u64, StoredIssue>,
    /// PRs and issues share one number sequence, as on most providers.
    next_number: u64,
    comments: HashMap<u64, Vec<MockComment>>,
    next_comment_id: u64,
    statuses: HashMap<String, Vec<StatusCheck>>,
    files: BTreeMap<FileKey, String>,
    branches: BTreeMap<String, MockBranch>,
    next_commit: u64,
    repos: Vec<MockRepo>,
    platform: Option<PlatformResult>,
    current_repo: Option<String>,
    groups: HashMap<String, Vec<String>>,
    unavailable_users: HashSet<String>,
    alerts: Vec<VulnerabilityAlert>,
    force_rebase_branches: HashSet<String>,
    label_limit: usize,
    internal_check_prefix: String,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Mock platform for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>`; clones share state.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    inner: Arc<Mutex<MockPlatformInner>>,
    capabilities: CapabilitySet,
}

impl MockPlatform {
    /// An empty mock supporting every optional capability.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockPlatformInner {
                prs: BTreeMap::new(),
                pr_bodies: HashMap::new(),
                assignees: HashMap::new(),
                issues: BTreeMap::new(),
                next_number: 1,
                comments: HashMap::new(),
                next_comment_id: 1,
                statuses: HashMap::new(),
                files: BTreeMap::new(),
                branches: BTreeMap::new(),
                next_commit: 1,
                repos: Vec::new(),
                platform: None,
                current_repo: None,
                groups: HashMap::new(),
                unavailable_users: HashSet::new(),
                alerts: Vec::new(),
                force_rebase_branches: HashSet::new(),
                label_limit: 50,
                internal_check_prefix: DEFAULT_INTERNAL_CHECK_PREFIX.to_string(),
                fail_on: None,
                operations: Vec::new(),
            })),
            capabilities: CapabilitySet::all(),
        }
    }

    /// A mock with pre-existing PRs.
    pub fn with_prs(prs: Vec<Pr>) -> Self {
        let mock = Self::new();
        {
            let mut inner = mock.state();
            let max = prs.iter().map(|p| p.number).max().unwrap_or(0);
            inner.next_number = max + 1;
            inner.prs = prs.into_iter().map(|p| (p.number, p)).collect();
        }
        mock
    }

    /// Restrict the optional capabilities this mock claims.
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_repo(self, repo: MockRepo) -> Self {
        self.state().repos.push(repo);
        self
    }

    /// Content served for `path` when no repository or ref is given.
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.with_file_at(None, None, path, content)
    }

    pub fn with_file_at(
        self,
        repo: Option<&str>,
        git_ref: Option<&str>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let key = FileKey {
            repo: repo.map(String::from),
            git_ref: git_ref.map(String::from),
            path: path.into(),
        };
        self.state().files.insert(key, content.into());
        self
    }

    /// A branch in the commit store holding `files`.
    pub fn with_branch(self, name: impl Into<String>, files: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.state();
            let sha = Self::next_sha(&mut inner);
            let files = files
                .iter()
                .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
                .collect();
            inner.branches.insert(name.into(), MockBranch { sha, files });
        }
        self
    }

    pub fn with_status(self, branch: impl Into<String>, check: StatusCheck) -> Self {
        self.state().statuses.entry(branch.into()).or_default().push(check);
        self
    }

    pub fn with_issue(self, title: impl Into<String>, body: impl Into<String>, state: IssueState) -> Self {
        {
            let mut inner = self.state();
            let number = inner.next_number;
            inner.next_number += 1;
            inner.issues.insert(
                number,
                StoredIssue {
                    number,
                    title: title.into(),
                    body: body.into(),
                    state,
                    labels: Vec::new(),
                },
            );
        }
        self
    }

    pub fn with_group(self, group: impl Into<String>, members: &[&str]) -> Self {
        self.state()
            .groups
            .insert(group.into(), members.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_unavailable_user(self, user: impl Into<String>) -> Self {
        self.state().unavailable_users.insert(user.into());
        self
    }

    pub fn with_vulnerability_alert(self, alert: VulnerabilityAlert) -> Self {
        self.state().alerts.push(alert);
        self
    }

    pub fn with_force_rebase(self, branch: impl Into<String>) -> Self {
        self.state().force_rebase_branches.insert(branch.into());
        self
    }

    pub fn with_label_limit(self, limit: usize) -> Self {
        self.state().label_limit = limit;
        self
    }

    pub fn with_internal_check_prefix(self, prefix: impl Into<String>) -> Self {
        self.state().internal_check_prefix = prefix.into();
        self
    }

    /// Configure the mock to fail on a specific call.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// All recorded mutating operations, in order.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// PR by number, bypassing failure injection.
    pub fn pr(&self, number: u64) -> Option<Pr> {
        self.state().prs.get(&number).cloned()
    }

    pub fn pr_body(&self, number: u64) -> Option<String> {
        self.state().pr_bodies.get(&number).cloned()
    }

    pub fn assignees(&self, number: u64) -> Vec<String> {
        self.state().assignees.get(&number).cloned().unwrap_or_default()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.state().issues.values().map(StoredIssue::snapshot).collect()
    }

    pub fn issue_labels(&self, number: u64) -> Vec<String> {
        self.state()
            .issues
            .get(&number)
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }

    /// Head of `branch` in the commit store.
    pub fn branch_head(&self, branch: &str) -> Option<String> {
        self.state().branches.get(branch).map(|b| b.sha.clone())
    }

    pub fn branch_file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path).cloned())
    }

    pub fn comments(&self, number: u64) -> Vec<MockComment> {
        self.state().comments.get(&number).cloned().unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, MockPlatformInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(inner: &mut MockPlatformInner, op: MockOperation) {
        inner.operations.push(op);
    }

    fn check_fail(&self, operation: &str) -> Result<(), PlatformError> {
        let inner = self.state();
        let err = match (&inner.fail_on, operation) {
            (Some(FailOn::Any(e)), _) => e,
            (Some(FailOn::InitPlatform(e)), "init_platform")
            | (Some(FailOn::InitRepo(e)), "init_repo")
            | (Some(FailOn::GetPrList(e)), "get_pr_list")
            | (Some(FailOn::FindPr(e)), "find_pr")
            | (Some(FailOn::CreatePr(e)), "create_pr")
            | (Some(FailOn::UpdatePr(e)), "update_pr")
            | (Some(FailOn::MergePr(e)), "merge_pr")
            | (Some(FailOn::GetBranchStatus(e)), "get_branch_status")
            | (Some(FailOn::EnsureIssue(e)), "ensure_issue")
            | (Some(FailOn::EnsureComment(e)), "ensure_comment")
            | (Some(FailOn::GetRawFile(e)), "get_raw_file") => e,
            _ => return Ok(()),
        };
        Err(err.clone())
    }

    fn next_sha(inner: &mut MockPlatformInner) -> String {
        let sha = format!("{:040x}", inner.next_commit);
        inner.next_commit += 1;
        sha
    }

    fn pr_not_found(number: u64) -> PlatformError {
        PlatformError::NotFound(format!("PR #{number}"))
    }

    /// PRs newest first.
    fn sorted_prs(inner: &MockPlatformInner) -> Vec<Pr> {
        inner.prs.values().rev().cloned().collect()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn max_body_length(&self) -> usize {
        60_000
    }

    async fn init_platform(&self, params: PlatformParams) -> Result<PlatformResult, PlatformError> {
        self.check_fail("init_platform")?;
        let mut inner = self.state();
        if let Some(existing) = &inner.platform {
            return Ok(existing.clone());
        }

        let mut endpoint = params.endpoint.unwrap_or_else(|| MOCK_ENDPOINT.to_string());
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let result = PlatformResult {
            endpoint,
            username: Some(params.username.unwrap_or_else(|| "depbot".to_string())),
            token: params.token,
            git_author: params.git_author,
            host_rules: Vec::new(),
        };
        inner.platform = Some(result.clone());
        Ok(result)
    }

    async fn init_repo(&self, params: RepoParams) -> Result<RepoResult, PlatformError> {
        self.check_fail("init_repo")?;
        let mut inner = self.state();
        let repo = inner
            .repos
            .iter()
            .find(|r| r.name == params.repository)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("repository {}", params.repository)))?;

        let endpoint = params
            .endpoint
            .or_else(|| inner.platform.as_ref().map(|p| p.endpoint.clone()))
            .unwrap_or_else(|| MOCK_ENDPOINT.to_string());

        inner.current_repo = Some(repo.name.clone());
        Self::record(
            &mut inner,
            MockOperation::InitRepo {
                repository: repo.name.clone(),
            },
        );

        Ok(RepoResult {
            default_branch: repo.default_branch,
            is_fork: repo.is_fork,
            repo_fingerprint: Fingerprint::for_repository(&endpoint, &repo.id.to_string()),
        })
    }

    async fn get_repos(&self, config: &AutodiscoverConfig) -> Result<Vec<String>, PlatformError> {
        self.check_fail("get_repos")?;
        let inner = self.state();
        let mut repos: Vec<&MockRepo> = inner
            .repos
            .iter()
            .filter(|r| config.include_mirrors || !r.is_mirror)
            .filter(|r| {
                config.topics.is_empty() || r.topics.iter().any(|t| config.topics.contains(t))
            })
            .filter(|r| {
                config.namespaces.is_empty()
                    || config
                        .namespaces
                        .iter()
                        .any(|ns| r.name.starts_with(&format!("{ns}/")))
            })
            .filter(|r| config.projects.is_empty() || config.projects.contains(&r.name))
            .collect();

        match config.sort {
            Some(RepoSortMethod::Alpha) => repos.sort_by(|a, b| a.name.cmp(&b.name)),
            Some(RepoSortMethod::Size) => repos.sort_by_key(|r| r.size),
            // Ids are assigned in creation order
            Some(RepoSortMethod::Id | RepoSortMethod::Created | RepoSortMethod::Updated) => {
                repos.sort_by_key(|r| r.id)
            }
            None => {}
        }
        if config.order == Some(SortOrder::Desc) {
            repos.reverse();
        }

        Ok(repos.into_iter().map(|r| r.name.clone()).collect())
    }

    async fn get_pr_list(&self) -> Result<Vec<Pr>, PlatformError> {
        self.check_fail("get_pr_list")?;
        Ok(Self::sorted_prs(&self.state()))
    }

    async fn find_pr(&self, config: &FindPrConfig) -> Result<Option<Pr>, PlatformError> {
        self.check_fail("find_pr")?;
        let inner = self.state();
        Ok(Self::sorted_prs(&inner)
            .into_iter()
            .find(|pr| config.matches(pr)))
    }

    async fn get_pr(&self, number: u64) -> Result<Option<Pr>, PlatformError> {
        self.check_fail("get_pr")?;
        Ok(self.state().prs.get(&number).cloned())
    }

    async fn get_branch_pr(
        &self,
        branch: &str,
        target_branch: Option<&str>,
    ) -> Result<Option<Pr>, PlatformError> {
        let mut config = FindPrConfig::new(branch).with_state(PrStateFilter::Open);
        config.target_branch = target_branch.map(String::from);
        self.find_pr(&config).await
    }

    async fn create_pr(&self, config: CreatePrConfig) -> Result<Pr, PlatformError> {
        self.check_fail("create_pr")?;
        let mut inner = self.state();

        if inner
            .prs
            .values()
            .any(|p| p.source_branch == config.source_branch && p.state == PrState::Open)
        {
            return Err(PlatformError::Conflict(format!(
                "a pull request already exists for {}",
                config.source_branch
            )));
        }

        let number = inner.next_number;
        inner.next_number += 1;

        let mut pr = Pr::new(number, config.source_branch.clone(), config.pr_title.clone());
        pr.target_branch = Some(config.target_branch.clone());
        pr.labels = config.labels.clone();
        pr.is_draft = config.draft;
        pr.created_at = Some(chrono::Utc::now());

        inner.prs.insert(number, pr.clone());
        inner.pr_bodies.insert(number, config.pr_body);
        Self::record(
            &mut inner,
            MockOperation::CreatePr {
                source_branch: config.source_branch,
                target_branch: config.target_branch,
                title: config.pr_title,
            },
        );
        Ok(pr)
    }

    async fn update_pr(&self, config: UpdatePrConfig) -> Result<(), PlatformError> {
        self.check_fail("update_pr")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&config.number)
            .ok_or_else(|| Self::pr_not_found(config.number))?;

        pr.title = config.pr_title.clone();
        if let Some(target) = &config.target_branch {
            pr.target_branch = Some(target.clone());
        }
        match config.state {
            Some(IssueState::Open) => {
                pr.state = PrState::Open;
                pr.closed_at = None;
            }
            Some(IssueState::Closed) => {
                pr.state = PrState::Closed;
                pr.closed_at = Some(chrono::Utc::now());
            }
            None => {}
        }
        // Full-replace primitive: apply the reconciled desired set
        if let Some(update) = &config.labels {
            pr.labels = reconcile_labels(&pr.labels, update).desired;
        }

        if let Some(body) = config.pr_body {
            inner.pr_bodies.insert(config.number, body);
        }
        Self::record(
            &mut inner,
            MockOperation::UpdatePr {
                number: config.number,
                title: config.pr_title,
                state: config.state,
            },
        );
        Ok(())
    }

    async fn merge_pr(&self, config: &MergePrConfig) -> Result<bool, PlatformError> {
        self.check_fail("merge_pr")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&config.id)
            .ok_or_else(|| Self::pr_not_found(config.id))?;

        if pr.state != PrState::Open {
            return Ok(false);
        }
        pr.state = PrState::Merged;
        pr.closed_at = Some(chrono::Utc::now());
        Self::record(&mut inner, MockOperation::MergePr { number: config.id });
        Ok(true)
    }

    async fn add_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), PlatformError> {
        self.check_fail("add_reviewers")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| Self::pr_not_found(number))?;
        for reviewer in reviewers {
            if !pr.reviewers.contains(reviewer) {
                pr.reviewers.push(reviewer.clone());
            }
        }
        Self::record(
            &mut inner,
            MockOperation::AddReviewers {
                number,
                reviewers: reviewers.to_vec(),
            },
        );
        Ok(())
    }

    async fn add_assignees(&self, number: u64, assignees: &[String]) -> Result<(), PlatformError> {
        self.check_fail("add_assignees")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| Self::pr_not_found(number))?;
        pr.has_assignees = pr.has_assignees || !assignees.is_empty();

        let stored = inner.assignees.entry(number).or_default();
        for assignee in assignees {
            if !stored.contains(assignee) {
                stored.push(assignee.clone());
            }
        }
        Self::record(
            &mut inner,
            MockOperation::AddAssignees {
                number,
                assignees: assignees.to_vec(),
            },
        );
        Ok(())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), PlatformError> {
        self.check_fail("add_label")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| Self::pr_not_found(number))?;
        if !pr.labels.iter().any(|l| l == label) {
            pr.labels.push(label.to_string());
        }
        Self::record(
            &mut inner,
            MockOperation::AddLabel {
                number,
                label: label.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_label(&self, number: u64, label: &str) -> Result<(), PlatformError> {
        self.check_fail("delete_label")?;
        let mut inner = self.state();
        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| Self::pr_not_found(number))?;
        pr.labels.retain(|l| l != label);
        Self::record(
            &mut inner,
            MockOperation::DeleteLabel {
                number,
                label: label.to_string(),
            },
        );
        Ok(())
    }

    async fn set_branch_status(&self, config: &BranchStatusConfig) -> Result<(), PlatformError> {
        self.check_fail("set_branch_status")?;
        let mut inner = self.state();
        let checks = inner.statuses.entry(config.branch_name.clone()).or_default();
        let state = CheckState::from(config.state);
        match checks.iter_mut().find(|c| c.context == config.context) {
            Some(existing) => existing.state = state,
            None => checks.push(StatusCheck::new(config.context.clone(), state)),
        }
        Self::record(
            &mut inner,
            MockOperation::SetBranchStatus {
                branch: config.branch_name.clone(),
                context: config.context.clone(),
                state: config.state,
            },
        );
        Ok(())
    }

    async fn get_branch_status(
        &self,
        branch: &str,
        internal_checks_as_success: bool,
    ) -> Result<BranchStatus, PlatformError> {
        self.check_fail("get_branch_status")?;
        let inner = self.state();
        let checks = inner.statuses.get(branch).cloned().unwrap_or_default();
        Ok(aggregate_branch_status(
            &checks,
            internal_checks_as_success,
            &inner.internal_check_prefix,
        ))
    }

    async fn get_branch_status_check(
        &self,
        branch: &str,
        context: &str,
    ) -> Result<Option<BranchStatus>, PlatformError> {
        self.check_fail("get_branch_status_check")?;
        Ok(self.state().statuses.get(branch).and_then(|checks| {
            checks
                .iter()
                .find(|c| c.context == context)
                .map(|c| BranchStatus::from(c.state))
        }))
    }

    async fn find_issue(&self, title: &str) -> Result<Option<Issue>, PlatformError> {
        self.check_fail("find_issue")?;
        Ok(self
            .state()
            .issues
            .values()
            .rev()
            .find(|i| i.title == title && i.state == IssueState::Open)
            .map(StoredIssue::snapshot))
    }

    async fn get_issue_list(&self) -> Result<Vec<Issue>, PlatformError> {
        self.check_fail("get_issue_list")?;
        Ok(self
            .state()
            .issues
            .values()
            .rev()
            .map(StoredIssue::snapshot)
            .collect())
    }

    // State is always current, so there is nothing to serve from a cache
    async fn get_issue(
        &self,
        number: u64,
        _use_cache: bool,
    ) -> Result<Option<Issue>, PlatformError> {
        self.check_fail("get_issue")?;
        Ok(self.state().issues.get(&number).map(StoredIssue::snapshot))
    }

    async fn ensure_issue(
        &self,
        config: &EnsureIssueConfig,
    ) -> Result<Option<EnsureIssueResult>, PlatformError> {
        self.check_fail("ensure_issue")?;
        let mut inner = self.state();

        // Newest first
        let candidates: Vec<u64> = inner
            .issues
            .values()
            .rev()
            .filter(|i| i.title == config.title || config.reuse_title.as_ref() == Some(&i.title))
            .map(|i| i.number)
            .collect();

        if !candidates.is_empty() {
            let open = candidates
                .iter()
                .copied()
                .find(|n| inner.issues[n].state == IssueState::Open);
            let chosen = match open {
                Some(n) => n,
                None if config.once => return Ok(None),
                None => candidates[0],
            };

            for n in candidates.iter().copied().filter(|n| *n != chosen) {
                if let Some(dup) = inner.issues.get_mut(&n) {
                    if dup.state == IssueState::Open {
                        dup.state = IssueState::Closed;
                        Self::record(&mut inner, MockOperation::CloseIssue { number: n });
                    }
                }
            }

            let issue = inner
                .issues
                .get_mut(&chosen)
                .ok_or_else(|| PlatformError::NotFound(format!("issue #{chosen}")))?;
            let was_open = issue.state == IssueState::Open;
            if was_open && issue.title == config.title && issue.body == config.body {
                return Ok(None);
            }
            if was_open || config.should_reopen {
                issue.title = config.title.clone();
                issue.body = config.body.clone();
                issue.state = IssueState::Open;
                if !config.labels.is_empty() {
                    issue.labels = config.labels.clone();
                }
                Self::record(
                    &mut inner,
                    MockOperation::UpdateIssue {
                        number: chosen,
                        title: config.title.clone(),
                        reopened: !was_open,
                    },
                );
                return Ok(Some(EnsureIssueResult::Updated));
            }
        }

        let number = inner.next_number;
        inner.next_number += 1;
        inner.issues.insert(
            number,
            StoredIssue {
                number,
                title: config.title.clone(),
                body: config.body.clone(),
                state: IssueState::Open,
                labels: config.labels.clone(),
            },
        );
        Self::record(
            &mut inner,
            MockOperation::CreateIssue {
                number,
                title: config.title.clone(),
            },
        );
        Ok(Some(EnsureIssueResult::Created))
    }

    async fn ensure_issue_closing(&self, title: &str) -> Result<(), PlatformError> {
        self.check_fail("ensure_issue_closing")?;
        let mut inner = self.state();
        let to_close: Vec<u64> = inner
            .issues
            .values()
            .filter(|i| i.title == title && i.state == IssueState::Open)
            .map(|i| i.number)
            .collect();
        for number in to_close {
            if let Some(issue) = inner.issues.get_mut(&number) {
                issue.state = IssueState::Closed;
            }
            Self::record(&mut inner, MockOperation::CloseIssue { number });
        }
        Ok(())
    }

    async fn ensure_comment(&self, config: &EnsureCommentConfig) -> Result<bool, PlatformError> {
        self.check_fail("ensure_comment")?;
        let mut inner = self.state();
        let body = config.body();

        let existing = {
            let comments = inner.comments.get(&config.number);
            comments.and_then(|cs| {
                cs.iter()
                    .find(|c| match &config.topic {
                        Some(topic) => super::types::comment_has_topic(&c.body, topic),
                        None => c.body == body,
                    })
                    .cloned()
            })
        };

        match existing {
            Some(comment) if comment.body == body => Ok(false),
            Some(comment) => {
                if let Some(stored) = inner
                    .comments
                    .get_mut(&config.number)
                    .and_then(|cs| cs.iter_mut().find(|c| c.id == comment.id))
                {
                    stored.body = body;
                }
                Self::record(
                    &mut inner,
                    MockOperation::UpdateComment {
                        number: config.number,
                        comment_id: comment.id,
                    },
                );
                Ok(true)
            }
            None => {
                let id = inner.next_comment_id;
                inner.next_comment_id += 1;
                inner
                    .comments
                    .entry(config.number)
                    .or_default()
                    .push(MockComment { id, body });
                Self::record(
                    &mut inner,
                    MockOperation::AddComment {
                        number: config.number,
                        comment_id: id,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn ensure_comment_removal(
        &self,
        config: &EnsureCommentRemoval,
    ) -> Result<(), PlatformError> {
        self.check_fail("ensure_comment_removal")?;
        let mut inner = self.state();
        let number = config.number();
        let removed: Vec<u64> = match inner.comments.get_mut(&number) {
            Some(comments) => {
                let ids = comments
                    .iter()
                    .filter(|c| config.matches(&c.body))
                    .map(|c| c.id)
                    .collect::<Vec<_>>();
                comments.retain(|c| !ids.contains(&c.id));
                ids
            }
            None => Vec::new(),
        };
        for comment_id in removed {
            Self::record(&mut inner, MockOperation::RemoveComment { number, comment_id });
        }
        Ok(())
    }

    async fn get_raw_file(
        &self,
        file_name: &str,
        repo: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, PlatformError> {
        self.check_fail("get_raw_file")?;
        let key = FileKey {
            repo: repo.map(String::from),
            git_ref: git_ref.map(String::from),
            path: file_name.to_string(),
        };
        Ok(self.state().files.get(&key).cloned())
    }

    fn vulnerability_alerts(&self) -> Option<&dyn VulnerabilityAlerts> {
        self.supports(Capability::VulnerabilityAlerts)
            .then_some(self as &dyn VulnerabilityAlerts)
    }

    fn group_members(&self) -> Option<&dyn GroupMembers> {
        self.supports(Capability::GroupMembers)
            .then_some(self as &dyn GroupMembers)
    }

    fn code_owner_rules(&self) -> Option<&dyn CodeOwnerRules> {
        self.supports(Capability::CodeOwnerRules)
            .then_some(self as &dyn CodeOwnerRules)
    }

    fn automerge_reattempt(&self) -> Option<&dyn AutomergeReattempt> {
        self.supports(Capability::AutomergeReattempt)
            .then_some(self as &dyn AutomergeReattempt)
    }

    fn branch_force_rebase(&self) -> Option<&dyn BranchForceRebase> {
        self.supports(Capability::BranchForceRebase)
            .then_some(self as &dyn BranchForceRebase)
    }

    fn autoclosed_pr_reuse(&self) -> Option<&dyn AutoclosedPrReuse> {
        self.supports(Capability::AutoclosedPrReuse)
            .then_some(self as &dyn AutoclosedPrReuse)
    }

    fn user_availability(&self) -> Option<&dyn UserAvailability> {
        self.supports(Capability::UserAvailability)
            .then_some(self as &dyn UserAvailability)
    }

    fn label_limit(&self) -> Option<&dyn LabelLimit> {
        self.supports(Capability::LabelLimit)
            .then_some(self as &dyn LabelLimit)
    }

    fn pr_refresh(&self) -> Option<&dyn PrRefresh> {
        self.supports(Capability::PrRefresh)
            .then_some(self as &dyn PrRefresh)
    }

    fn platform_commit(&self) -> Option<&dyn PlatformCommit> {
        self.supports(Capability::PlatformCommit)
            .then_some(self as &dyn PlatformCommit)
    }

    fn fork_sync(&self) -> Option<&dyn ForkSync> {
        self.supports(Capability::ForkSync)
            .then_some(self as &dyn ForkSync)
    }
}

#[async_trait]
impl VulnerabilityAlerts for MockPlatform {
    async fn get_vulnerability_alerts(&self) -> Result<Vec<VulnerabilityAlert>, PlatformError> {
        Ok(self.state().alerts.clone())
    }
}

#[async_trait]
impl GroupMembers for MockPlatform {
    async fn expand_group_members(
        &self,
        reviewers_or_assignees: &[String],
    ) -> Result<Vec<String>, PlatformError> {
        let inner = self.state();
        let mut expanded: Vec<String> = Vec::new();
        for entry in reviewers_or_assignees {
            let members = inner
                .groups
                .get(entry.trim_start_matches('@'))
                .cloned()
                .unwrap_or_else(|| vec![entry.clone()]);
            for member in members {
                if !expanded.contains(&member) {
                    expanded.push(member);
                }
            }
        }
        Ok(expanded)
    }
}

impl CodeOwnerRules for MockPlatform {
    fn extract_rules_from_code_owners_lines(&self, lines: &[String]) -> Vec<FileOwnerRule> {
        lines.iter().filter_map(|l| FileOwnerRule::parse_line(l)).collect()
    }
}

#[async_trait]
impl AutomergeReattempt for MockPlatform {
    async fn reattempt_platform_automerge(
        &self,
        config: &ReattemptAutomergeConfig,
    ) -> Result<(), PlatformError> {
        let mut inner = self.state();
        if !inner.prs.contains_key(&config.number) {
            return Err(Self::pr_not_found(config.number));
        }
        Self::record(
            &mut inner,
            MockOperation::ReattemptAutomerge {
                number: config.number,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl BranchForceRebase for MockPlatform {
    async fn get_branch_force_rebase(&self, branch: &str) -> Result<bool, PlatformError> {
        Ok(self.state().force_rebase_branches.contains(branch))
    }
}

#[async_trait]
impl AutoclosedPrReuse for MockPlatform {
    async fn try_reuse_autoclosed_pr(&self, pr: &Pr) -> Result<Option<Pr>, PlatformError> {
        let mut inner = self.state();
        let stored = inner
            .prs
            .get_mut(&pr.number)
            .ok_or_else(|| Self::pr_not_found(pr.number))?;
        if stored.state != PrState::Closed || !stored.title.ends_with(AUTOCLOSED_SUFFIX) {
            return Ok(None);
        }
        stored.title.truncate(stored.title.len() - AUTOCLOSED_SUFFIX.len());
        stored.state = PrState::Open;
        stored.closed_at = None;
        let reopened = stored.clone();
        Self::record(&mut inner, MockOperation::ReopenPr { number: pr.number });
        Ok(Some(reopened))
    }
}

#[async_trait]
impl UserAvailability for MockPlatform {
    async fn filter_unavailable_users(&self, users: &[String]) -> Result<Vec<String>, PlatformError> {
        let inner = self.state();
        Ok(users
            .iter()
            .filter(|u| !inner.unavailable_users.contains(*u))
            .cloned()
            .collect())
    }
}

impl LabelLimit for MockPlatform {
    fn label_char_limit(&self) -> usize {
        self.state().label_limit
    }
}

#[async_trait]
impl PrRefresh for MockPlatform {
    async fn refresh_pr(&self, number: u64) -> Result<(), PlatformError> {
        self.check_fail("refresh_pr")?;
        let mut inner = self.state();
        if !inner.prs.contains_key(&number) {
            return Err(Self::pr_not_found(number));
        }
        Self::record(&mut inner, MockOperation::RefreshPr { number });
        Ok(())
    }
}

#[async_trait]
impl PlatformCommit for MockPlatform {
    async fn commit_files(
        &self,
        config: &CommitFilesConfig,
    ) -> Result<Option<CommitSha>, PlatformError> {
        self.check_fail("commit_files")?;
        let mut inner = self.state();
        let mut files = inner
            .branches
            .get(config.base_branch.as_str())
            .map(|b| b.files.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("branch {}", config.base_branch)))?;
        for change in &config.files {
            match change {
                FileChange::Addition { path, contents } => {
                    files.insert(path.clone(), contents.clone());
                }
                FileChange::Deletion { path } => {
                    files.remove(path);
                }
            }
        }

        let branch = config.branch_name.to_string();
        let unchanged = inner.branches.get(&branch).is_some_and(|b| b.files == files);
        if unchanged && !config.force {
            return Ok(None);
        }

        let sha = Self::next_sha(&mut inner);
        inner.branches.insert(
            branch.clone(),
            MockBranch {
                sha: sha.clone(),
                files,
            },
        );
        Self::record(
            &mut inner,
            MockOperation::CommitFiles {
                branch,
                sha: sha.clone(),
            },
        );
        CommitSha::new(sha)
            .map(Some)
            .map_err(|e| PlatformError::Transient(e.to_string()))
    }
}

#[async_trait]
impl ForkSync for MockPlatform {
    async fn sync_fork_with_upstream(&self, base_branch: &str) -> Result<(), PlatformError> {
        self.check_fail("sync_fork_with_upstream")?;
        let mut inner = self.state();
        let current = inner
            .current_repo
            .as_ref()
            .ok_or_else(|| PlatformError::Conflict("no repository initialized".into()))?;
        let is_fork = inner.repos.iter().any(|r| &r.name == current && r.is_fork);
        if !is_fork {
            return Err(PlatformError::Conflict(format!("{current} is not a fork")));
        }
        Self::record(
            &mut inner,
            MockOperation::SyncFork {
                base_branch: base_branch.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::LabelUpdate;

    fn pr(number: u64, branch: &str, state: PrState) -> Pr {
        let mut pr = Pr::new(number, branch, format!("PR {number}"));
        pr.state = state;
        pr.target_branch = Some("main".into());
        pr
    }

    #[tokio::test]
    async fn find_pr_not_open_skips_open() {
        let platform = MockPlatform::with_prs(vec![
            pr(1, "depbot/a", PrState::Open),
            pr(2, "depbot/a", PrState::Closed),
        ]);
        let found = platform
            .find_pr(&FindPrConfig::new("depbot/a").with_state(PrStateFilter::NotOpen))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.number, 2);
    }

    #[tokio::test]
    async fn create_pr_rejects_duplicate_open_branch() {
        let platform = MockPlatform::with_prs(vec![pr(4, "depbot/a", PrState::Open)]);
        let err = platform
            .create_pr(CreatePrConfig {
                source_branch: "depbot/a".into(),
                target_branch: "main".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_pr_applies_incremental_labels() {
        let mut existing = pr(1, "depbot/a", PrState::Open);
        existing.labels = vec!["deps".into(), "stale".into()];
        let platform = MockPlatform::with_prs(vec![existing]);

        platform
            .update_pr(UpdatePrConfig {
                number: 1,
                pr_title: "PR 1".into(),
                labels: Some(LabelUpdate::Incremental {
                    add: vec!["major".into()],
                    remove: vec!["stale".into()],
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(platform.pr(1).unwrap().labels, vec!["deps", "major"]);
    }

    #[tokio::test]
    async fn merge_only_open_prs() {
        let platform = MockPlatform::with_prs(vec![
            pr(1, "depbot/a", PrState::Open),
            pr(2, "depbot/b", PrState::Closed),
        ]);
        assert!(platform.merge_pr(&MergePrConfig { id: 1, ..Default::default() }).await.unwrap());
        assert!(!platform.merge_pr(&MergePrConfig { id: 2, ..Default::default() }).await.unwrap());
        assert_eq!(platform.pr(1).unwrap().state, PrState::Merged);
    }

    #[tokio::test]
    async fn fail_on_injects_errors() {
        let platform = MockPlatform::new().fail_on(FailOn::GetPrList(PlatformError::RateLimited {
            retry_after: Some(60),
        }));
        let err = platform.get_pr_list().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(platform.find_pr(&FindPrConfig::new("x")).await.is_ok());

        platform.clear_fail_on();
        assert!(platform.get_pr_list().await.is_ok());
    }

    #[tokio::test]
    async fn capability_accessors_follow_declared_set() {
        let full = MockPlatform::new();
        assert!(full.vulnerability_alerts().is_some());
        assert!(full.label_limit().is_some());

        let limited = MockPlatform::new()
            .with_capabilities(CapabilitySet::from_iter([Capability::LabelLimit]));
        assert!(limited.vulnerability_alerts().is_none());
        assert!(limited.group_members().is_none());
        assert_eq!(limited.label_limit().map(|l| l.label_char_limit()), Some(50));
    }

    #[tokio::test]
    async fn group_expansion_dedupes() {
        let platform = MockPlatform::new().with_group("core", &["alice", "bob"]);
        let expanded = platform
            .expand_group_members(&["@core".into(), "alice".into(), "carol".into()])
            .await
            .unwrap();
        assert_eq!(expanded, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn autoclosed_pr_is_reopened() {
        let mut closed = pr(3, "depbot/a", PrState::Closed);
        closed.title = "Update a - autoclosed".into();
        let platform = MockPlatform::with_prs(vec![closed.clone()]);

        let reopened = platform.try_reuse_autoclosed_pr(&closed).await.unwrap().unwrap();
        assert_eq!(reopened.title, "Update a");
        assert_eq!(reopened.state, PrState::Open);
    }
}
