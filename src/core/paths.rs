//! core::paths
//!
//! Centralized path routing for depbot storage locations.
//!
//! # Storage Layout
//!
//! Repository-scoped data lives under `<git_dir>/depbot/`:
//! - `config.toml` - Repository configuration overrides
//! - `cache/repository.json` - Persisted branch cache
//! - `cache/repository.json.lock` - Session lock held while a pass owns the cache
//!
//! A configured `cache_dir` replaces `<git_dir>/depbot/cache`.
//!
//! # Example
//!
//! ```
//! use depbot::core::paths::DepbotPaths;
//! use std::path::PathBuf;
//!
//! let paths = DepbotPaths::new(PathBuf::from("/repo/.git"));
//! assert_eq!(
//!     paths.repo_config_path(),
//!     PathBuf::from("/repo/.git/depbot/config.toml")
//! );
//! assert_eq!(
//!     paths.repo_cache_path(),
//!     PathBuf::from("/repo/.git/depbot/cache/repository.json")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Name of the persisted branch cache file.
pub const REPO_CACHE_FILE: &str = "repository.json";

/// Path routing for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepbotPaths {
    git_dir: PathBuf,
    cache_dir: Option<PathBuf>,
}

impl DepbotPaths {
    /// Create paths rooted at a repository's `.git` directory.
    pub fn new(git_dir: PathBuf) -> Self {
        Self {
            git_dir,
            cache_dir: None,
        }
    }

    /// Override the cache directory (from the `cache_dir` config key).
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// `<git_dir>/depbot`
    pub fn repo_depbot_dir(&self) -> PathBuf {
        self.git_dir.join("depbot")
    }

    /// `<git_dir>/depbot/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.repo_depbot_dir().join("config.toml")
    }

    /// Directory holding the persisted cache.
    pub fn repo_cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => self.repo_depbot_dir().join("cache"),
        }
    }

    /// The persisted branch cache file.
    pub fn repo_cache_path(&self) -> PathBuf {
        self.repo_cache_dir().join(REPO_CACHE_FILE)
    }

    /// The `.git` directory these paths are rooted at.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let paths = DepbotPaths::new(PathBuf::from("/r/.git"));
        assert_eq!(paths.repo_depbot_dir(), PathBuf::from("/r/.git/depbot"));
        assert_eq!(paths.repo_cache_dir(), PathBuf::from("/r/.git/depbot/cache"));
        assert_eq!(paths.git_dir(), Path::new("/r/.git"));
    }

    #[test]
    fn cache_dir_override() {
        let paths = DepbotPaths::new(PathBuf::from("/r/.git"))
            .with_cache_dir(Some(PathBuf::from("/var/cache/depbot")));
        assert_eq!(
            paths.repo_cache_path(),
            PathBuf::from("/var/cache/depbot/repository.json")
        );
        // Config stays repo-scoped
        assert_eq!(
            paths.repo_config_path(),
            PathBuf::from("/r/.git/depbot/config.toml")
        );
    }
}
