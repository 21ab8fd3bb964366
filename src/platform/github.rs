//! platform::github
//!
//! GitHub platform implementation using the REST v3 API.
//!
//! # Design
//!
//! One `GitHubPlatform` serves one repository at a time, selected by
//! [`Platform::init_repo`]. The platform identity from
//! [`Platform::init_platform`] is cached, so repeated calls return the first
//! result without another round trip.
//!
//! List endpoints are paginated through the `Link` header; callers always
//! see complete lists. The bot's PR list is cached per repository and
//! dropped after every PR mutation or when a lookup asks for a refresh.
//!
//! # Errors
//!
//! HTTP failures are mapped onto [`PlatformError`]:
//!
//! | Response                               | Error            |
//! |----------------------------------------|------------------|
//! | 401, 403                               | `Authentication` |
//! | 429, 403 with exhausted rate limit     | `RateLimited`    |
//! | 404                                    | `NotFound`       |
//! | 409, 422, other 4xx                    | `Conflict`       |
//! | 5xx, network errors, undecodable body  | `Transient`      |
//!
//! # Example
//!
//! ```ignore
//! use depbot::platform::github::GitHubPlatform;
//! use depbot::platform::{Platform, PlatformParams, RepoParams};
//!
//! let platform = GitHubPlatform::new(None, Some(token))?;
//! platform.init_platform(PlatformParams::default()).await?;
//! let repo = platform.init_repo(RepoParams {
//!     repository: "octocat/hello-world".into(),
//!     ..Default::default()
//! }).await?;
//! println!("default branch: {}", repo.default_branch);
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace, warn};
use url::Url;

use super::capabilities::{Capability, CapabilitySet};
use super::labels::reconcile_labels;
use super::status::aggregate_branch_status;
use super::traits::{
    AutoclosedPrReuse, BranchForceRebase, ForkSync, Platform, PlatformCommit, PlatformError,
    PrRefresh, VulnerabilityAlerts,
};
use super::types::{
    comment_has_topic, AutodiscoverConfig, BranchStatus, BranchStatusConfig, CheckState,
    CreatePrConfig, EnsureCommentConfig, EnsureCommentRemoval, EnsureIssueConfig,
    EnsureIssueResult, FindPrConfig, HostRule, Issue, IssueState, MergePrConfig, MergeStrategy,
    PlatformParams, PlatformResult, Pr, PrBodyStruct, PrState, PrStateFilter, RepoParams,
    RepoResult, RepoSortMethod, SortOrder, StatusCheck, UpdatePrConfig, VulnerabilityAlert,
};
use crate::core::config::DEFAULT_INTERNAL_CHECK_PREFIX;
use crate::core::types::{CommitSha, Fingerprint};
use crate::git::{CommitFilesConfig, FileChange};

/// Default GitHub API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "depbot";

const PER_PAGE: u32 = 100;

/// GitHub rejects PR and issue bodies above this size.
const MAX_BODY_LENGTH: usize = 60_000;

const AUTOCLOSED_SUFFIX: &str = " - autoclosed";

#[derive(Debug, Clone)]
struct RepoContext {
    repository: String,
    ignore_pr_author: bool,
}

#[derive(Debug, Clone)]
struct CachedPr {
    pr: Pr,
    author: Option<String>,
}

/// GitHub platform implementation.
pub struct GitHubPlatform {
    client: Client,
    /// Normalized API base, always ending in `/`.
    api_base: String,
    token: Mutex<Option<String>>,
    internal_check_prefix: String,
    capabilities: CapabilitySet,
    platform: Mutex<Option<PlatformResult>>,
    repo: Mutex<Option<RepoContext>>,
    prs: Mutex<Option<Vec<CachedPr>>>,
    /// Issues fetched by number since `init_repo`.
    issues: Mutex<HashMap<u64, Issue>>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubPlatform")
            .field("api_base", &self.api_base)
            .field("has_token", &lock(&self.token).is_some())
            .field("repository", &self.repository().ok())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Normalize an API endpoint to an absolute URL ending in `/`.
///
/// `https://github.com` is rewritten to the public API host; GitHub
/// Enterprise endpoints (`https://ghe.example.com/api/v3`) are kept.
///
/// ```
/// use depbot::platform::github::normalize_endpoint;
///
/// assert_eq!(normalize_endpoint("https://github.com").unwrap(), "https://api.github.com/");
/// assert_eq!(
///     normalize_endpoint("https://ghe.example.com/api/v3").unwrap(),
///     "https://ghe.example.com/api/v3/"
/// );
/// assert!(normalize_endpoint("not a url").is_err());
/// ```
pub fn normalize_endpoint(endpoint: &str) -> Result<String, PlatformError> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| PlatformError::Conflict(format!("invalid endpoint '{endpoint}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PlatformError::Conflict(format!(
            "invalid endpoint '{endpoint}': unsupported scheme"
        )));
    }
    if url.host_str() == Some("github.com") {
        return Ok(DEFAULT_ENDPOINT.to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Extract the `rel="next"` URL from a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == r#"rel="next""#);
        is_next.then(|| {
            target
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

/// Seconds to wait before retrying, from `Retry-After` or the rate-limit reset.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(secs) = header("retry-after").and_then(|v| v.parse().ok()) {
        return Some(secs);
    }
    let reset: i64 = header("x-ratelimit-reset")?.parse().ok()?;
    Some((reset - Utc::now().timestamp()).max(0) as u64)
}

/// Map a failed HTTP status onto the closed error set.
pub fn classify_status(
    status: StatusCode,
    message: String,
    rate_limit_exhausted: bool,
    retry_after: Option<u64>,
) -> PlatformError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if rate_limit_exhausted => PlatformError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(message),
        StatusCode::NOT_FOUND => PlatformError::NotFound(message),
        _ if status.is_client_error() => PlatformError::Conflict(message),
        _ => PlatformError::Transient(format!("GitHub returned {status}: {message}")),
    }
}

fn transport(err: reqwest::Error) -> PlatformError {
    PlatformError::Transient(err.to_string())
}

impl GitHubPlatform {
    /// Create a platform for `endpoint` (defaults to public GitHub).
    pub fn new(endpoint: Option<&str>, token: Option<String>) -> Result<Self, PlatformError> {
        let api_base = match endpoint {
            Some(endpoint) => normalize_endpoint(endpoint)?,
            None => DEFAULT_ENDPOINT.to_string(),
        };
        Ok(Self {
            client: Client::new(),
            api_base,
            token: Mutex::new(token),
            internal_check_prefix: DEFAULT_INTERNAL_CHECK_PREFIX.to_string(),
            capabilities: CapabilitySet::from_iter([
                Capability::VulnerabilityAlerts,
                Capability::BranchForceRebase,
                Capability::AutoclosedPrReuse,
                Capability::PrRefresh,
                Capability::PlatformCommit,
                Capability::ForkSync,
            ]),
            platform: Mutex::new(None),
            repo: Mutex::new(None),
            prs: Mutex::new(None),
            issues: Mutex::new(HashMap::new()),
        })
    }

    /// Context prefix identifying the bot's own status checks.
    pub fn with_internal_check_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.internal_check_prefix = prefix.into();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The repository selected by `init_repo`.
    pub fn repository(&self) -> Result<String, PlatformError> {
        lock(&self.repo)
            .as_ref()
            .map(|r| r.repository.clone())
            .ok_or_else(|| PlatformError::Conflict("no repository initialized".into()))
    }

    fn username(&self) -> Option<String> {
        lock(&self.platform).as_ref().and_then(|p| p.username.clone())
    }

    fn invalidate_pr_cache(&self) {
        *lock(&self.prs) = None;
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_base, path.trim_start_matches('/'))
        }
    }

    fn repo_url(&self, path: &str) -> Result<String, PlatformError> {
        Ok(self.url(&format!("repos/{}/{}", self.repository()?, path)))
    }

    /// Repo URL with `segment` appended as one percent-encoded path segment.
    fn repo_url_with_segment(&self, path: &str, segment: &str) -> Result<String, PlatformError> {
        let mut url = Url::parse(&self.repo_url(path)?)
            .map_err(|e| PlatformError::Conflict(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| PlatformError::Conflict("cannot extend API URL".into()))?
            .pop_if_empty()
            .push(segment);
        Ok(url.to_string())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = lock(&self.token).as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request, returning the response only when it succeeded.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, PlatformError> {
        trace!(%method, url, "GitHub request");
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().await.map_err(transport)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn error_from_response(response: Response) -> PlatformError {
        let status = response.status();
        let headers = response.headers().clone();
        let exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };
        let exhausted = exhausted || message.to_lowercase().contains("rate limit");
        classify_status(status, message, exhausted, retry_after(&headers))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
        response
            .json()
            .await
            .map_err(|e| PlatformError::Transient(format!("failed to parse response: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, PlatformError> {
        Self::decode(self.send(Method::GET, url, None).await?).await
    }

    /// GET that treats 404 as absence.
    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, PlatformError> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET every page of a list endpoint, following `Link: rel="next"`.
    async fn get_paginated<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, PlatformError> {
        self.get_paginated_in(url, |page: Vec<T>| page).await
    }

    /// [`Self::get_paginated`] for endpoints that wrap each page in an object.
    async fn get_paginated_in<P, T, F>(&self, url: &str, items_of: F) -> Result<Vec<T>, PlatformError>
    where
        P: DeserializeOwned,
        F: Fn(P) -> Vec<T>,
    {
        let separator = if url.contains('?') { '&' } else { '?' };
        let mut next = Some(format!("{url}{separator}per_page={PER_PAGE}"));
        let mut items = Vec::new();

        while let Some(url) = next {
            let response = self.send(Method::GET, &url, None).await?;
            next = next_link(response.headers());
            let page: P = Self::decode(response).await?;
            items.extend(items_of(page));
        }
        Ok(items)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, PlatformError> {
        Self::decode(self.send(method, url, Some(body)).await?).await
    }

    // -------------------------------------------------------------------------
    // Pull requests
    // -------------------------------------------------------------------------

    async fn cached_prs(&self, refresh: bool) -> Result<Vec<CachedPr>, PlatformError> {
        if !refresh {
            if let Some(prs) = lock(&self.prs).as_ref() {
                return Ok(prs.clone());
            }
        }

        let url = self.repo_url("pulls?state=all&sort=created&direction=desc")?;
        let raw: Vec<GitHubPullRequest> = self.get_paginated(&url).await?;
        let mut prs: Vec<CachedPr> = raw
            .into_iter()
            .map(|gh| CachedPr {
                author: gh.user.as_ref().map(|u| u.login.clone()),
                pr: gh.into(),
            })
            .collect();
        prs.sort_by(|a, b| b.pr.number.cmp(&a.pr.number));
        debug!(count = prs.len(), "Retrieved pull requests");

        *lock(&self.prs) = Some(prs.clone());
        Ok(prs)
    }

    /// Whether a cached PR counts as the bot's own.
    fn authored_by_bot(&self, pr: &CachedPr) -> bool {
        let ignore_author = lock(&self.repo)
            .as_ref()
            .map(|r| r.ignore_pr_author)
            .unwrap_or(false);
        match (ignore_author, self.username()) {
            (true, _) | (_, None) => true,
            (false, Some(username)) => pr.author.as_deref() == Some(username.as_str()),
        }
    }

    async fn current_labels(&self, number: u64) -> Result<Vec<String>, PlatformError> {
        let url = self.repo_url(&format!("issues/{number}/labels"))?;
        let labels: Vec<GitHubLabel> = self.get_paginated(&url).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), PlatformError> {
        if labels.is_empty() {
            return Ok(());
        }
        let url = self.repo_url(&format!("issues/{number}/labels"))?;
        self.send(Method::POST, &url, Some(json!({ "labels": labels })))
            .await?;
        Ok(())
    }

    async fn branch_head(&self, branch: &str) -> Result<String, PlatformError> {
        let url = self.repo_url(&format!("branches/{branch}"))?;
        let branch: GitHubBranch = self.get(&url).await?;
        Ok(branch.commit.sha)
    }

    async fn status_checks(&self, branch: &str) -> Result<Vec<StatusCheck>, PlatformError> {
        let url = self.repo_url(&format!("commits/{branch}/status"))?;
        let statuses = self
            .get_paginated_in(&url, |page: GitHubCombinedStatus| page.statuses)
            .await?;
        let mut checks: Vec<StatusCheck> = statuses
            .into_iter()
            .map(|s| StatusCheck::new(s.context, status_state(&s.state)))
            .collect();

        let url = self.repo_url(&format!("commits/{branch}/check-runs"))?;
        let runs = self
            .get_paginated_in(&url, |page: GitHubCheckRuns| page.check_runs)
            .await;
        match runs {
            Ok(runs) => checks.extend(
                runs.into_iter()
                    .map(|r| StatusCheck::new(r.name.clone(), r.state())),
            ),
            // Tokens without checks permission still see commit statuses
            Err(PlatformError::Authentication(msg)) => {
                debug!(%msg, "Check runs not readable, using commit statuses only");
            }
            Err(e) => return Err(e),
        }
        Ok(checks)
    }

    // -------------------------------------------------------------------------
    // Issues and comments
    // -------------------------------------------------------------------------

    async fn bot_issues(&self) -> Result<Vec<GitHubIssue>, PlatformError> {
        let mut path = String::from("issues?state=all&sort=created&direction=desc");
        if let Some(username) = self.username() {
            path.push_str(&format!("&creator={username}"));
        }
        let url = self.repo_url(&path)?;
        let issues: Vec<GitHubIssue> = self.get_paginated(&url).await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .collect())
    }

    async fn patch_issue(&self, number: u64, body: serde_json::Value) -> Result<(), PlatformError> {
        let url = self.repo_url(&format!("issues/{number}"))?;
        self.send(Method::PATCH, &url, Some(body)).await?;
        Ok(())
    }

    async fn comments(&self, number: u64) -> Result<Vec<GitHubComment>, PlatformError> {
        let url = self.repo_url(&format!("issues/{number}/comments"))?;
        self.get_paginated(&url).await
    }
}

fn status_state(state: &str) -> CheckState {
    match state {
        "success" => CheckState::Success,
        "failure" => CheckState::Failure,
        "error" => CheckState::Error,
        _ => CheckState::Pending,
    }
}

fn merge_method(strategy: Option<MergeStrategy>) -> Option<&'static str> {
    match strategy? {
        MergeStrategy::Auto => None,
        MergeStrategy::MergeCommit => Some("merge"),
        MergeStrategy::Squash => Some("squash"),
        // GitHub has no fast-forward merge; rebase keeps history linear
        MergeStrategy::Rebase | MergeStrategy::FastForward => Some("rebase"),
    }
}

#[async_trait]
impl Platform for GitHubPlatform {
    fn name(&self) -> &'static str {
        "github"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn max_body_length(&self) -> usize {
        MAX_BODY_LENGTH
    }

    async fn init_platform(&self, params: PlatformParams) -> Result<PlatformResult, PlatformError> {
        if let Some(existing) = lock(&self.platform).as_ref() {
            return Ok(existing.clone());
        }

        if let Some(endpoint) = &params.endpoint {
            let normalized = normalize_endpoint(endpoint)?;
            if normalized != self.api_base {
                return Err(PlatformError::Conflict(format!(
                    "endpoint {normalized} does not match configured {}",
                    self.api_base
                )));
            }
        }
        if let Some(token) = params.token {
            *lock(&self.token) = Some(token);
        }
        let token = lock(&self.token)
            .clone()
            .ok_or_else(|| PlatformError::Authentication("no GitHub token configured".into()))?;

        let user: GitHubUser = self.get(&self.url("user")).await?;
        let username = params.username.unwrap_or(user.login);
        let git_author = params.git_author.or_else(|| {
            user.email
                .map(|email| format!("{} <{}>", user.name.unwrap_or_else(|| username.clone()), email))
        });
        debug!(%username, "Authenticated with GitHub");

        let match_host = Url::parse(&self.api_base)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| self.api_base.clone());
        let result = PlatformResult {
            endpoint: self.api_base.clone(),
            username: Some(username),
            token: Some(token.clone()),
            git_author,
            host_rules: vec![HostRule {
                host_type: Some("github".into()),
                match_host,
                token: Some(token),
            }],
        };

        // A concurrent call may have won the race; keep the first result
        Ok(lock(&self.platform).get_or_insert(result).clone())
    }

    async fn init_repo(&self, params: RepoParams) -> Result<RepoResult, PlatformError> {
        let url = self.url(&format!("repos/{}", params.repository));
        let repo: GitHubRepo = self.get(&url).await?;

        if repo.archived {
            return Err(PlatformError::Conflict(format!(
                "repository {} is archived",
                params.repository
            )));
        }
        if repo.mirror_url.is_some() && !params.include_mirrors {
            return Err(PlatformError::Conflict(format!(
                "repository {} is a mirror",
                params.repository
            )));
        }

        let endpoint = match &params.endpoint {
            Some(endpoint) => normalize_endpoint(endpoint)?,
            None => self.api_base.clone(),
        };
        *lock(&self.repo) = Some(RepoContext {
            repository: repo.full_name.clone(),
            ignore_pr_author: params.ignore_pr_author,
        });
        self.invalidate_pr_cache();
        lock(&self.issues).clear();
        debug!(repository = %repo.full_name, id = repo.id, "Initialized repository");

        Ok(RepoResult {
            default_branch: repo.default_branch,
            is_fork: repo.fork,
            repo_fingerprint: Fingerprint::for_repository(&endpoint, &repo.id.to_string()),
        })
    }

    async fn get_repos(&self, config: &AutodiscoverConfig) -> Result<Vec<String>, PlatformError> {
        let repos: Vec<GitHubRepo> = self.get_paginated(&self.url("user/repos")).await?;
        let mut repos: Vec<GitHubRepo> = repos
            .into_iter()
            .filter(|r| !r.archived)
            .filter(|r| config.include_mirrors || r.mirror_url.is_none())
            .filter(|r| {
                config.topics.is_empty() || r.topics.iter().any(|t| config.topics.contains(t))
            })
            .filter(|r| {
                config.namespaces.is_empty()
                    || config
                        .namespaces
                        .iter()
                        .any(|ns| r.full_name.starts_with(&format!("{ns}/")))
            })
            .filter(|r| config.projects.is_empty() || config.projects.contains(&r.full_name))
            .collect();

        match config.sort {
            Some(RepoSortMethod::Alpha) => repos.sort_by(|a, b| a.full_name.cmp(&b.full_name)),
            Some(RepoSortMethod::Created) => repos.sort_by_key(|r| r.created_at),
            Some(RepoSortMethod::Updated) => repos.sort_by_key(|r| r.updated_at),
            Some(RepoSortMethod::Size) => repos.sort_by_key(|r| r.size),
            Some(RepoSortMethod::Id) => repos.sort_by_key(|r| r.id),
            None => {}
        }
        if config.order == Some(SortOrder::Desc) {
            repos.reverse();
        }
        Ok(repos.into_iter().map(|r| r.full_name).collect())
    }

    async fn get_pr_list(&self) -> Result<Vec<Pr>, PlatformError> {
        Ok(self
            .cached_prs(false)
            .await?
            .into_iter()
            .filter(|p| self.authored_by_bot(p))
            .map(|p| p.pr)
            .collect())
    }

    async fn find_pr(&self, config: &FindPrConfig) -> Result<Option<Pr>, PlatformError> {
        let prs = self.cached_prs(config.refresh_cache).await?;
        let found = prs
            .into_iter()
            .filter(|p| config.include_other_authors || self.authored_by_bot(p))
            .map(|p| p.pr)
            .find(|pr| config.matches(pr));
        if let Some(pr) = &found {
            debug!(branch = %config.branch_name, number = pr.number, "Found PR");
        }
        Ok(found)
    }

    async fn get_pr(&self, number: u64) -> Result<Option<Pr>, PlatformError> {
        let url = self.repo_url(&format!("pulls/{number}"))?;
        Ok(self
            .get_optional::<GitHubPullRequest>(&url)
            .await?
            .map(Pr::from))
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
        let url = self.repo_url("pulls")?;
        let body = json!({
            "title": config.pr_title,
            "head": config.source_branch,
            "base": config.target_branch,
            "body": self.massage_markdown(&config.pr_body),
            "draft": config.draft,
            "maintainer_can_modify": !config.options.fork_mode_disallow_maintainer_edits,
        });
        let created: GitHubPullRequest = self.send_json(Method::POST, &url, body).await?;
        self.invalidate_pr_cache();

        let mut pr = Pr::from(created);
        self.add_labels(pr.number, &config.labels).await?;
        pr.labels = config.labels.clone();

        if let Some(milestone) = config.milestone {
            // Milestones are best effort; the PR itself exists already
            if let Err(e) = self.patch_issue(pr.number, json!({ "milestone": milestone })).await {
                warn!(number = pr.number, milestone, error = %e, "Failed to set milestone");
            }
        }
        debug!(number = pr.number, branch = %config.source_branch, "Created PR");
        Ok(pr)
    }

    async fn update_pr(&self, config: UpdatePrConfig) -> Result<(), PlatformError> {
        let url = self.repo_url(&format!("pulls/{}", config.number))?;
        let mut body = json!({ "title": config.pr_title });
        if let Some(pr_body) = &config.pr_body {
            body["body"] = json!(self.massage_markdown(pr_body));
        }
        if let Some(state) = config.state {
            body["state"] = json!(state.to_string());
        }
        if let Some(target) = &config.target_branch {
            body["base"] = json!(target);
        }
        let updated: GitHubPullRequest = self.send_json(Method::PATCH, &url, body).await?;
        self.invalidate_pr_cache();

        if let Some(update) = &config.labels {
            let current = match updated.labels {
                Some(labels) => labels.into_iter().map(|l| l.name).collect(),
                None => self.current_labels(config.number).await?,
            };
            let plan = reconcile_labels(&current, update);
            self.add_labels(config.number, &plan.add).await?;
            for label in &plan.remove {
                self.delete_label(config.number, label).await?;
            }
        }
        Ok(())
    }

    async fn merge_pr(&self, config: &MergePrConfig) -> Result<bool, PlatformError> {
        let url = self.repo_url(&format!("pulls/{}/merge", config.id))?;
        let mut body = json!({});
        if let Some(method) = merge_method(config.strategy) {
            body["merge_method"] = json!(method);
        }
        let response = self
            .request(Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            self.invalidate_pr_cache();
            debug!(number = config.id, "Merged PR");
            return Ok(true);
        }
        // 405: not mergeable, 409: head moved
        if matches!(status, StatusCode::METHOD_NOT_ALLOWED | StatusCode::CONFLICT) {
            warn!(number = config.id, %status, "GitHub declined the merge");
            return Ok(false);
        }
        Err(Self::error_from_response(response).await)
    }

    async fn add_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), PlatformError> {
        // `org/team` entries are team reviewers
        let (teams, users): (Vec<&String>, Vec<&String>) =
            reviewers.iter().partition(|r| r.contains('/'));
        let team_slugs: Vec<&str> = teams
            .iter()
            .filter_map(|t| t.rsplit('/').next())
            .collect();
        let url = self.repo_url(&format!("pulls/{number}/requested_reviewers"))?;
        self.send(
            Method::POST,
            &url,
            Some(json!({ "reviewers": users, "team_reviewers": team_slugs })),
        )
        .await?;
        Ok(())
    }

    async fn add_assignees(&self, number: u64, assignees: &[String]) -> Result<(), PlatformError> {
        let url = self.repo_url(&format!("issues/{number}/assignees"))?;
        self.send(Method::POST, &url, Some(json!({ "assignees": assignees })))
            .await?;
        Ok(())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), PlatformError> {
        self.add_labels(number, &[label.to_string()]).await
    }

    async fn delete_label(&self, number: u64, label: &str) -> Result<(), PlatformError> {
        let url = self.repo_url_with_segment(&format!("issues/{number}/labels"), label)?;
        match self.send(Method::DELETE, &url, None).await {
            Ok(_) | Err(PlatformError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn set_branch_status(&self, config: &BranchStatusConfig) -> Result<(), PlatformError> {
        let existing = self
            .get_branch_status_check(&config.branch_name, &config.context)
            .await?;
        if existing == Some(config.state) {
            debug!(branch = %config.branch_name, context = %config.context, "Status check already set");
            return Ok(());
        }

        let sha = self.branch_head(&config.branch_name).await?;
        let state = match config.state {
            BranchStatus::Green => "success",
            BranchStatus::Yellow => "pending",
            BranchStatus::Red => "failure",
        };
        let mut body = json!({
            "state": state,
            "context": config.context,
            "description": config.description,
        });
        if let Some(url) = &config.url {
            body["target_url"] = json!(url);
        }
        let url = self.repo_url(&format!("statuses/{sha}"))?;
        self.send(Method::POST, &url, Some(body)).await?;
        Ok(())
    }

    async fn get_branch_status(
        &self,
        branch: &str,
        internal_checks_as_success: bool,
    ) -> Result<BranchStatus, PlatformError> {
        let checks = self.status_checks(branch).await?;
        let status =
            aggregate_branch_status(&checks, internal_checks_as_success, &self.internal_check_prefix);
        debug!(branch, checks = checks.len(), %status, "Branch status");
        Ok(status)
    }

    async fn get_branch_status_check(
        &self,
        branch: &str,
        context: &str,
    ) -> Result<Option<BranchStatus>, PlatformError> {
        let checks = match self.status_checks(branch).await {
            Ok(checks) => checks,
            Err(PlatformError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(checks
            .into_iter()
            .find(|c| c.context == context)
            .map(|c| BranchStatus::from(c.state)))
    }

    async fn find_issue(&self, title: &str) -> Result<Option<Issue>, PlatformError> {
        Ok(self
            .bot_issues()
            .await?
            .into_iter()
            .find(|i| i.title == title && i.state == IssueState::Open)
            .map(Issue::from))
    }

    async fn get_issue_list(&self) -> Result<Vec<Issue>, PlatformError> {
        Ok(self.bot_issues().await?.into_iter().map(Issue::from).collect())
    }

    async fn get_issue(
        &self,
        number: u64,
        use_cache: bool,
    ) -> Result<Option<Issue>, PlatformError> {
        if use_cache {
            let cached = lock(&self.issues).get(&number).cloned();
            if cached.is_some() {
                trace!(number, "Issue served from cache");
                return Ok(cached);
            }
        }

        let url = self.repo_url(&format!("issues/{number}"))?;
        let issue = self
            .get_optional::<GitHubIssue>(&url)
            .await?
            .map(Issue::from);
        let mut issues = lock(&self.issues);
        match &issue {
            Some(issue) => issues.insert(number, issue.clone()),
            None => issues.remove(&number),
        };
        Ok(issue)
    }

    async fn ensure_issue(
        &self,
        config: &EnsureIssueConfig,
    ) -> Result<Option<EnsureIssueResult>, PlatformError> {
        let body = self.massage_markdown(&config.body);
        lock(&self.issues).clear();
        let candidates: Vec<GitHubIssue> = self
            .bot_issues()
            .await?
            .into_iter()
            .filter(|i| i.title == config.title || config.reuse_title.as_ref() == Some(&i.title))
            .collect();

        if !candidates.is_empty() {
            let open = candidates.iter().find(|i| i.state == IssueState::Open);
            let chosen = match open {
                Some(issue) => issue,
                None if config.once => {
                    debug!(title = %config.title, "Issue already closed, not reopening");
                    return Ok(None);
                }
                None => &candidates[0],
            };

            for duplicate in candidates
                .iter()
                .filter(|i| i.number != chosen.number && i.state == IssueState::Open)
            {
                debug!(number = duplicate.number, "Closing duplicate issue");
                self.patch_issue(duplicate.number, json!({ "state": "closed" }))
                    .await?;
            }

            let was_open = chosen.state == IssueState::Open;
            if was_open
                && chosen.title == config.title
                && chosen.body.as_deref().unwrap_or_default() == body
            {
                return Ok(None);
            }
            if was_open || config.should_reopen {
                let mut update = json!({
                    "title": config.title,
                    "body": body,
                    "state": "open",
                });
                if !config.labels.is_empty() {
                    update["labels"] = json!(config.labels);
                }
                self.patch_issue(chosen.number, update).await?;
                return Ok(Some(EnsureIssueResult::Updated));
            }
        }

        let url = self.repo_url("issues")?;
        self.send(
            Method::POST,
            &url,
            Some(json!({ "title": config.title, "body": body, "labels": config.labels })),
        )
        .await?;
        debug!(title = %config.title, "Created issue");
        Ok(Some(EnsureIssueResult::Created))
    }

    async fn ensure_issue_closing(&self, title: &str) -> Result<(), PlatformError> {
        lock(&self.issues).clear();
        for issue in self.bot_issues().await? {
            if issue.title == title && issue.state == IssueState::Open {
                debug!(number = issue.number, "Closing issue");
                self.patch_issue(issue.number, json!({ "state": "closed" }))
                    .await?;
            }
        }
        Ok(())
    }

    async fn ensure_comment(&self, config: &EnsureCommentConfig) -> Result<bool, PlatformError> {
        let body = self.massage_markdown(&config.body());
        let comments = self.comments(config.number).await?;
        let existing = comments.iter().find(|c| match &config.topic {
            Some(topic) => comment_has_topic(&c.body, topic),
            None => c.body == body,
        });

        match existing {
            Some(comment) if comment.body == body => {
                debug!(number = config.number, "Comment is already up to date");
                Ok(false)
            }
            Some(comment) => {
                let url = self.repo_url(&format!("issues/comments/{}", comment.id))?;
                self.send(Method::PATCH, &url, Some(json!({ "body": body })))
                    .await?;
                debug!(number = config.number, comment = comment.id, "Updated comment");
                Ok(true)
            }
            None => {
                let url = self.repo_url(&format!("issues/{}/comments", config.number))?;
                self.send(Method::POST, &url, Some(json!({ "body": body })))
                    .await?;
                debug!(number = config.number, "Added comment");
                Ok(true)
            }
        }
    }

    async fn ensure_comment_removal(
        &self,
        config: &EnsureCommentRemoval,
    ) -> Result<(), PlatformError> {
        for comment in self.comments(config.number()).await? {
            if config.matches(&comment.body) {
                let url = self.repo_url(&format!("issues/comments/{}", comment.id))?;
                self.send(Method::DELETE, &url, None).await?;
                debug!(number = config.number(), comment = comment.id, "Removed comment");
            }
        }
        Ok(())
    }

    async fn get_raw_file(
        &self,
        file_name: &str,
        repo: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, PlatformError> {
        let repository = match repo {
            Some(repo) => repo.to_string(),
            None => self.repository()?,
        };
        let mut url = Url::parse(&self.url(&format!(
            "repos/{repository}/contents/{}",
            file_name.trim_start_matches('/')
        )))
        .map_err(|e| PlatformError::Conflict(e.to_string()))?;
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }

        let Some(content) = self.get_optional::<GitHubContent>(url.as_str()).await? else {
            return Ok(None);
        };
        if content.encoding.as_deref() != Some("base64") {
            return Err(PlatformError::Conflict(format!(
                "{file_name} is not available as file content"
            )));
        }
        let packed: String = content
            .content
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| PlatformError::Transient(format!("invalid base64 content: {e}")))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| PlatformError::Conflict(format!("{file_name} is not UTF-8 text")))
    }

    fn vulnerability_alerts(&self) -> Option<&dyn VulnerabilityAlerts> {
        Some(self as &dyn VulnerabilityAlerts)
    }

    fn branch_force_rebase(&self) -> Option<&dyn BranchForceRebase> {
        Some(self as &dyn BranchForceRebase)
    }

    fn autoclosed_pr_reuse(&self) -> Option<&dyn AutoclosedPrReuse> {
        Some(self as &dyn AutoclosedPrReuse)
    }

    fn pr_refresh(&self) -> Option<&dyn PrRefresh> {
        Some(self as &dyn PrRefresh)
    }

    fn platform_commit(&self) -> Option<&dyn PlatformCommit> {
        Some(self as &dyn PlatformCommit)
    }

    fn fork_sync(&self) -> Option<&dyn ForkSync> {
        Some(self as &dyn ForkSync)
    }
}

#[async_trait]
impl VulnerabilityAlerts for GitHubPlatform {
    async fn get_vulnerability_alerts(&self) -> Result<Vec<VulnerabilityAlert>, PlatformError> {
        let url = self.repo_url("dependabot/alerts?state=open")?;
        let alerts: Vec<GitHubAlert> = match self.get_paginated(&url).await {
            Ok(alerts) => alerts,
            // Alerts disabled for the repository
            Err(PlatformError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(alerts.into_iter().map(VulnerabilityAlert::from).collect())
    }
}

#[async_trait]
impl BranchForceRebase for GitHubPlatform {
    async fn get_branch_force_rebase(&self, branch: &str) -> Result<bool, PlatformError> {
        let url = self.repo_url(&format!("branches/{branch}/protection"))?;
        let protection: Option<GitHubProtection> = self.get_optional(&url).await?;
        Ok(protection
            .and_then(|p| p.required_status_checks)
            .map(|c| c.strict)
            .unwrap_or(false))
    }
}

#[async_trait]
impl AutoclosedPrReuse for GitHubPlatform {
    async fn try_reuse_autoclosed_pr(&self, pr: &Pr) -> Result<Option<Pr>, PlatformError> {
        if pr.state != PrState::Closed || !pr.title.ends_with(AUTOCLOSED_SUFFIX) {
            return Ok(None);
        }
        let Some(sha) = &pr.sha else {
            return Ok(None);
        };

        // Recreate the deleted source branch at the PR's last head
        let url = self.repo_url("git/refs")?;
        let recreated = self
            .send(
                Method::POST,
                &url,
                Some(json!({ "ref": format!("refs/heads/{}", pr.source_branch), "sha": sha.as_str() })),
            )
            .await;
        match recreated {
            Ok(_) | Err(PlatformError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }

        let title = pr.title[..pr.title.len() - AUTOCLOSED_SUFFIX.len()].to_string();
        let url = self.repo_url(&format!("pulls/{}", pr.number))?;
        let reopened: GitHubPullRequest = self
            .send_json(Method::PATCH, &url, json!({ "state": "open", "title": title }))
            .await?;
        self.invalidate_pr_cache();
        debug!(number = pr.number, "Reopened autoclosed PR");
        Ok(Some(reopened.into()))
    }
}

#[async_trait]
impl PrRefresh for GitHubPlatform {
    async fn refresh_pr(&self, number: u64) -> Result<(), PlatformError> {
        let url = self.repo_url(&format!("pulls/{number}"))?;
        let gh: GitHubPullRequest = self.get(&url).await?;
        let fresh = CachedPr {
            author: gh.user.as_ref().map(|u| u.login.clone()),
            pr: gh.into(),
        };

        // Without a cached list the next lookup fetches everything anyway
        if let Some(prs) = lock(&self.prs).as_mut() {
            match prs.iter_mut().find(|p| p.pr.number == number) {
                Some(existing) => *existing = fresh,
                None => {
                    prs.push(fresh);
                    prs.sort_by(|a, b| b.pr.number.cmp(&a.pr.number));
                }
            }
        }
        debug!(number, "Refreshed cached PR");
        Ok(())
    }
}

#[async_trait]
impl PlatformCommit for GitHubPlatform {
    async fn commit_files(
        &self,
        config: &CommitFilesConfig,
    ) -> Result<Option<CommitSha>, PlatformError> {
        let url = self.repo_url(&format!("branches/{}", config.base_branch))?;
        let base: GitHubBranch = self.get(&url).await?;
        let base_tree = base.tree_sha().ok_or_else(|| {
            PlatformError::Transient(format!("branch {} has no tree", config.base_branch))
        })?;

        let mut entries = Vec::with_capacity(config.files.len());
        for change in &config.files {
            let sha = match change {
                FileChange::Addition { contents, .. } => {
                    let url = self.repo_url("git/blobs")?;
                    let content = base64::engine::general_purpose::STANDARD.encode(contents);
                    let blob: GitHubSha = self
                        .send_json(
                            Method::POST,
                            &url,
                            json!({ "content": content, "encoding": "base64" }),
                        )
                        .await?;
                    Some(blob.sha)
                }
                FileChange::Deletion { .. } => None,
            };
            entries.push(json!({
                "path": change.path(),
                "mode": "100644",
                "type": "blob",
                "sha": sha,
            }));
        }
        let url = self.repo_url("git/trees")?;
        let tree: GitHubSha = self
            .send_json(
                Method::POST,
                &url,
                json!({ "base_tree": base_tree, "tree": entries }),
            )
            .await?;

        let url = self.repo_url(&format!("branches/{}", config.branch_name))?;
        let existing: Option<GitHubBranch> = self.get_optional(&url).await?;
        if !config.force
            && existing.as_ref().and_then(GitHubBranch::tree_sha) == Some(tree.sha.as_str())
        {
            debug!(branch = %config.branch_name, "Branch content unchanged, skipping commit");
            return Ok(None);
        }

        let url = self.repo_url("git/commits")?;
        let commit: GitHubSha = self
            .send_json(
                Method::POST,
                &url,
                json!({
                    "message": config.message,
                    "tree": tree.sha,
                    "parents": [base.commit.sha],
                }),
            )
            .await?;

        let body = json!({ "sha": commit.sha, "force": true });
        if existing.is_some() {
            let url = self.repo_url(&format!("git/refs/heads/{}", config.branch_name))?;
            self.send(Method::PATCH, &url, Some(body)).await?;
        } else {
            let url = self.repo_url("git/refs")?;
            let body = json!({
                "ref": format!("refs/heads/{}", config.branch_name),
                "sha": commit.sha,
            });
            self.send(Method::POST, &url, Some(body)).await?;
        }
        debug!(branch = %config.branch_name, sha = %commit.sha, "Committed files via API");

        CommitSha::new(commit.sha)
            .map(Some)
            .map_err(|e| PlatformError::Transient(e.to_string()))
    }
}

#[async_trait]
impl ForkSync for GitHubPlatform {
    async fn sync_fork_with_upstream(&self, base_branch: &str) -> Result<(), PlatformError> {
        let url = self.repo_url("merge-upstream")?;
        self.send(Method::POST, &url, Some(json!({ "branch": base_branch })))
            .await?;
        debug!(base_branch, "Synced fork with upstream");
        Ok(())
    }
}

// --------------------------------------------------------------------------
// API Response Types
// --------------------------------------------------------------------------

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GitHubRepo {
    id: u64,
    full_name: String,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    archived: bool,
    mirror_url: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    size: u64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GitHubLogin {
    login: String,
}

#[derive(Deserialize)]
struct GitHubLabel {
    name: String,
}

#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: Option<String>,
    repo: Option<GitHubRepoName>,
}

#[derive(Deserialize)]
struct GitHubRepoName {
    full_name: String,
}

#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    state: String,
    title: String,
    body: Option<String>,
    #[serde(default)]
    draft: bool,
    head: GitHubRef,
    base: GitHubRef,
    user: Option<GitHubLogin>,
    /// Absent on some write responses.
    labels: Option<Vec<GitHubLabel>>,
    #[serde(default)]
    requested_reviewers: Vec<GitHubLogin>,
    #[serde(default)]
    assignees: Vec<GitHubLogin>,
    created_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    mergeable_state: Option<String>,
}

impl From<GitHubPullRequest> for Pr {
    fn from(gh: GitHubPullRequest) -> Self {
        let state = if gh.merged_at.is_some() {
            PrState::Merged
        } else if gh.state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        };
        let body_struct = gh.body.as_deref().map(PrBodyStruct::from_body);
        let cannot_merge_reason = match gh.mergeable_state.as_deref() {
            Some("blocked") => Some("blocked by branch protection".to_string()),
            Some("dirty") => Some("merge conflicts".to_string()),
            _ => None,
        };

        let mut pr = Pr::new(gh.number, gh.head.ref_name, gh.title);
        pr.target_branch = Some(gh.base.ref_name);
        pr.state = state;
        pr.labels = gh.labels.unwrap_or_default().into_iter().map(|l| l.name).collect();
        pr.reviewers = gh.requested_reviewers.into_iter().map(|r| r.login).collect();
        pr.has_assignees = !gh.assignees.is_empty();
        pr.sha = gh.head.sha.and_then(|s| CommitSha::new(s).ok());
        pr.body_struct = body_struct;
        pr.is_draft = gh.draft;
        pr.created_at = gh.created_at;
        pr.closed_at = gh.closed_at;
        pr.cannot_merge_reason = cannot_merge_reason;
        pr.source_repo = gh.head.repo.map(|r| r.full_name);
        pr
    }
}

#[derive(Deserialize)]
struct GitHubBranch {
    commit: GitHubCommitRef,
}

impl GitHubBranch {
    fn tree_sha(&self) -> Option<&str> {
        self.commit.commit.as_ref().map(|c| c.tree.sha.as_str())
    }
}

#[derive(Deserialize)]
struct GitHubCommitRef {
    sha: String,
    commit: Option<GitHubCommitDetail>,
}

#[derive(Deserialize)]
struct GitHubCommitDetail {
    tree: GitHubSha,
}

#[derive(Deserialize)]
struct GitHubSha {
    sha: String,
}

#[derive(Deserialize)]
struct GitHubCombinedStatus {
    #[serde(default)]
    statuses: Vec<GitHubStatus>,
}

#[derive(Deserialize)]
struct GitHubStatus {
    context: String,
    state: String,
}

#[derive(Deserialize)]
struct GitHubCheckRuns {
    #[serde(default)]
    check_runs: Vec<GitHubCheckRun>,
}

#[derive(Deserialize)]
struct GitHubCheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
}

impl GitHubCheckRun {
    fn state(&self) -> CheckState {
        if self.status != "completed" {
            return CheckState::Pending;
        }
        match self.conclusion.as_deref() {
            Some("success") => CheckState::Success,
            Some("neutral") | Some("skipped") => CheckState::Skipped,
            _ => CheckState::Failure,
        }
    }
}

#[derive(Deserialize)]
struct GitHubIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: IssueState,
    pull_request: Option<serde_json::Value>,
}

impl From<GitHubIssue> for Issue {
    fn from(gh: GitHubIssue) -> Self {
        Issue {
            number: Some(gh.number),
            title: Some(gh.title),
            body: gh.body,
            state: Some(gh.state),
        }
    }
}

#[derive(Deserialize)]
struct GitHubComment {
    id: u64,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct GitHubContent {
    content: Option<String>,
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct GitHubProtection {
    required_status_checks: Option<GitHubRequiredChecks>,
}

#[derive(Deserialize)]
struct GitHubRequiredChecks {
    #[serde(default)]
    strict: bool,
}

#[derive(Deserialize)]
struct GitHubAlert {
    security_vulnerability: GitHubVulnerability,
    security_advisory: Option<GitHubAdvisory>,
}

#[derive(Deserialize)]
struct GitHubVulnerability {
    package: GitHubPackage,
    vulnerable_version_range: String,
    first_patched_version: Option<GitHubPatchedVersion>,
    severity: Option<String>,
}

#[derive(Deserialize)]
struct GitHubPackage {
    name: String,
    ecosystem: String,
}

#[derive(Deserialize)]
struct GitHubPatchedVersion {
    identifier: String,
}

#[derive(Deserialize)]
struct GitHubAdvisory {
    ghsa_id: String,
}

impl From<GitHubAlert> for VulnerabilityAlert {
    fn from(alert: GitHubAlert) -> Self {
        let vuln = alert.security_vulnerability;
        VulnerabilityAlert {
            package_name: vuln.package.name,
            ecosystem: vuln.package.ecosystem,
            vulnerable_range: vuln.vulnerable_version_range,
            first_patched_version: vuln.first_patched_version.map(|v| v.identifier),
            severity: vuln.severity,
            advisory_id: alert.security_advisory.map(|a| a.ghsa_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn normalizes_endpoints() {
        assert_eq!(normalize_endpoint("https://api.github.com").unwrap(), DEFAULT_ENDPOINT);
        assert_eq!(normalize_endpoint("https://github.com/").unwrap(), DEFAULT_ENDPOINT);
        assert_eq!(
            normalize_endpoint("http://127.0.0.1:8080").unwrap(),
            "http://127.0.0.1:8080/"
        );
        assert!(normalize_endpoint("ftp://example.com").is_err());
    }

    #[test]
    fn parses_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "link",
            HeaderValue::from_static(
                r#"<https://api.github.com/repos/o/r/pulls?page=2>; rel="next", <https://api.github.com/repos/o/r/pulls?page=5>; rel="last""#,
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/repos/o/r/pulls?page=2")
        );

        let mut last_page = HeaderMap::new();
        last_page.insert(
            "link",
            HeaderValue::from_static(r#"<https://api.github.com/x?page=1>; rel="first""#),
        );
        assert_eq!(next_link(&last_page), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }

    #[test]
    fn classifies_statuses() {
        let msg = || "boom".to_string();
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, msg(), false, None),
            PlatformError::Authentication("boom".into())
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, msg(), true, Some(12)),
            PlatformError::RateLimited { retry_after: Some(12) }
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, msg(), false, None),
            PlatformError::NotFound("boom".into())
        );
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, msg(), false, None),
            PlatformError::Conflict("boom".into())
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, msg(), false, None),
            PlatformError::Transient(_)
        ));
    }

    #[test]
    fn retry_after_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("0"));
        assert_eq!(retry_after(&headers), Some(30));

        let mut reset_only = HeaderMap::new();
        reset_only.insert("x-ratelimit-reset", HeaderValue::from_static("0"));
        assert_eq!(retry_after(&reset_only), Some(0));
    }

    #[test]
    fn merge_methods() {
        assert_eq!(merge_method(None), None);
        assert_eq!(merge_method(Some(MergeStrategy::Auto)), None);
        assert_eq!(merge_method(Some(MergeStrategy::Squash)), Some("squash"));
        assert_eq!(merge_method(Some(MergeStrategy::FastForward)), Some("rebase"));
    }

    #[test]
    fn converts_merged_pr() {
        let gh: GitHubPullRequest = serde_json::from_value(json!({
            "number": 12,
            "state": "closed",
            "title": "Update serde",
            "body": "body\n- [x] <!-- rebase-check -->",
            "head": { "ref": "depbot/serde", "sha": "abc123", "repo": { "full_name": "o/r" } },
            "base": { "ref": "main" },
            "user": { "login": "depbot" },
            "labels": [{ "name": "deps" }],
            "merged_at": "2024-01-02T03:04:05Z"
        }))
        .unwrap();
        let pr = Pr::from(gh);
        assert_eq!(pr.state, PrState::Merged);
        assert_eq!(pr.target_branch.as_deref(), Some("main"));
        assert_eq!(pr.labels, vec!["deps"]);
        assert_eq!(pr.sha.as_ref().map(|s| s.as_str()), Some("abc123"));
        assert!(pr.body_struct.unwrap().rebase_requested);
    }

    #[test]
    fn check_run_states() {
        let run = |status: &str, conclusion: Option<&str>| GitHubCheckRun {
            name: "ci".into(),
            status: status.into(),
            conclusion: conclusion.map(String::from),
        };
        assert_eq!(run("in_progress", None).state(), CheckState::Pending);
        assert_eq!(run("completed", Some("success")).state(), CheckState::Success);
        assert_eq!(run("completed", Some("skipped")).state(), CheckState::Skipped);
        assert_eq!(run("completed", Some("timed_out")).state(), CheckState::Failure);
    }

    #[test]
    fn debug_redacts_token() {
        let platform = GitHubPlatform::new(None, Some("ghp_secret".into())).unwrap();
        let debug = format!("{platform:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("has_token: true"));
    }

    #[test]
    fn repo_operations_require_init() {
        let platform = GitHubPlatform::new(None, None).unwrap();
        assert!(matches!(platform.repository(), Err(PlatformError::Conflict(_))));
    }
}
