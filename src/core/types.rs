//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`CommitSha`] - Commit identifier as reported by git or a provider
//! - [`GitAuthor`] - Parsed `Name <email>` identity the bot commits as
//! - [`Fingerprint`] - SHA-256 digest used for repository identity
//!
//! # Examples
//!
//! ```
//! use depbot::core::types::{BranchName, CommitSha};
//!
//! let branch = BranchName::new("depbot/serde-1.x").unwrap();
//! let sha = CommitSha::new("4f2a9c1").unwrap();
//! assert_eq!(branch.as_str(), "depbot/serde-1.x");
//! assert_eq!(sha.short(4), "4f2a");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(CommitSha::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid commit sha: {0}")]
    InvalidCommitSha(String),

    #[error("invalid git author: {0}")]
    InvalidAuthor(String),
}

/// A validated Git branch name.
///
/// Follows `git check-ref-format --branch`:
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`, or end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, control characters, or any of `` ~^:\?*[``
///
/// # Example
///
/// ```
/// use depbot::core::types::BranchName;
///
/// assert!(BranchName::new("main").is_ok());
/// assert!(BranchName::new("depbot/lock-file-maintenance").is_ok());
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |why: &str| Err(TypeError::InvalidBranchName(format!("'{name}': {why}")));

        if name.is_empty() {
            return reject("cannot be empty");
        }
        if name == "@" {
            return reject("'@' is reserved");
        }
        if name.starts_with('-') {
            return reject("cannot start with '-'");
        }
        if name.starts_with('/') || name.ends_with('/') {
            return reject("cannot start or end with '/'");
        }
        for forbidden in ["..", "@{", "//"] {
            if name.contains(forbidden) {
                return reject(&format!("cannot contain '{forbidden}'"));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return reject(&format!("cannot contain {c:?}"));
        }

        // Per-component rules also cover a leading '.' and a trailing ".lock".
        for component in name.split('/') {
            if component.starts_with('.') {
                return reject("path component cannot start with '.'");
            }
            if component.ends_with(".lock") {
                return reject("path component cannot end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full local ref for this branch (`refs/heads/<name>`).
    pub fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Remote-tracking ref for this branch (`refs/remotes/<remote>/<name>`).
    pub fn remote_ref(&self, remote: &str) -> String {
        format!("refs/remotes/{}/{}", remote, self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for BranchName {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commit identifier.
///
/// Providers and git both report full hex SHAs, but the cache only ever
/// compares identifiers for exact equality, so any non-empty token without
/// whitespace is accepted. Hex input is normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    /// Create a new commit identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCommitSha` for empty input or input containing whitespace.
    pub fn new(sha: impl Into<String>) -> Result<Self, TypeError> {
        let sha = sha.into();
        if sha.is_empty() {
            return Err(TypeError::InvalidCommitSha("cannot be empty".into()));
        }
        if sha.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidCommitSha(format!(
                "'{sha}' contains whitespace"
            )));
        }
        if sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Self(sha.to_ascii_lowercase()));
        }
        Ok(Self(sha))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form, at most `len` characters.
    pub fn short(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for CommitSha {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}

impl AsRef<str> for CommitSha {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitSha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity the bot commits as, parsed from `Name <email>`.
///
/// # Example
///
/// ```
/// use depbot::core::types::GitAuthor;
///
/// let author = GitAuthor::parse("Depbot <bot@depbot.dev>").unwrap();
/// assert_eq!(author.name, "Depbot");
/// assert_eq!(author.email, "bot@depbot.dev");
///
/// // A bare address is accepted and reused as the name
/// let bare = GitAuthor::parse("bot@depbot.dev").unwrap();
/// assert_eq!(bare.name, "bot@depbot.dev");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitAuthor {
    pub name: String,
    pub email: String,
}

impl GitAuthor {
    /// Default identity used when none is configured.
    pub fn bot_default() -> Self {
        Self {
            name: "Depbot".to_string(),
            email: "bot@depbot.dev".to_string(),
        }
    }

    /// Parse `Name <email>` or a bare email address.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let input = input.trim();
        if let Some((name, rest)) = input.split_once('<') {
            let email = rest
                .strip_suffix('>')
                .ok_or_else(|| TypeError::InvalidAuthor(format!("'{input}': unterminated '<'")))?
                .trim();
            let name = name.trim();
            if email.is_empty() || !email.contains('@') {
                return Err(TypeError::InvalidAuthor(format!(
                    "'{input}': missing email address"
                )));
            }
            let name = if name.is_empty() { email } else { name };
            return Ok(Self {
                name: name.to_string(),
                email: email.to_string(),
            });
        }

        if input.contains('@') && !input.contains(char::is_whitespace) {
            return Ok(Self {
                name: input.to_string(),
                email: input.to_string(),
            });
        }

        Err(TypeError::InvalidAuthor(format!(
            "'{input}': expected 'Name <email>'"
        )))
    }

    /// Case-insensitive email comparison.
    pub fn matches_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

impl std::fmt::Display for GitAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A SHA-256 digest rendered as lowercase hex.
///
/// Used as the repository fingerprint: the same (endpoint, repository id)
/// pair always yields the same value.
///
/// # Example
///
/// ```
/// use depbot::core::types::Fingerprint;
///
/// let a = Fingerprint::for_repository("https://api.github.com/", "123456");
/// let b = Fingerprint::for_repository("https://api.github.com/", "123456");
/// let moved = Fingerprint::for_repository("https://api.github.com/", "654321");
/// assert_eq!(a, b);
/// assert_ne!(a, moved);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest arbitrary parts, separated so that `("ab", "c")` and `("a", "bc")` differ.
    pub fn compute<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            let part = part.as_ref();
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint for a repository hosted at `endpoint` with a provider-assigned id.
    pub fn for_repository(endpoint: &str, repository_id: &str) -> Self {
        Self::compute([endpoint.trim_end_matches('/'), repository_id])
    }

    /// Wrap an existing hex digest (e.g. read back from disk).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
