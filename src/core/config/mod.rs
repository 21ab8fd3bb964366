//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! depbot has two configuration scopes:
//! - **Global**: bot-level settings (platform, endpoint, identity)
//! - **Repo**: per-repository overrides (remote, base branch, identity)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! The access token never comes from a file; it is read from `DEPBOT_TOKEN`.
//!
//! # Example
//!
//! ```no_run
//! use depbot::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! let config = result.config;
//! println!("Remote: {}", config.remote());
//! println!("Author: {}", config.git_author());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::DepbotPaths;
use crate::core::types::GitAuthor;
use crate::platform::PlatformParams;

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV: &str = "DEPBOT_CONFIG";

/// Environment variable holding the provider access token.
pub const TOKEN_ENV: &str = "DEPBOT_TOKEN";

/// Default prefix of status checks created by the bot itself.
pub const DEFAULT_INTERNAL_CHECK_PREFIX: &str = "depbot/";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Files that were read, in precedence order.
    pub sources: Vec<PathBuf>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads `<git_dir>/depbot/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or validated.
    /// Missing config files are not an error (defaults are used).
    pub fn load(git_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = Self::find_global();
        let repo_path = git_dir.map(|dir| DepbotPaths::new(dir.to_path_buf()).repo_config_path());
        Self::load_from(global_path.as_deref(), repo_path.as_deref())
    }

    /// Load configuration from explicit file locations.
    ///
    /// Paths that do not exist are skipped.
    pub fn load_from(
        global_path: Option<&Path>,
        repo_path: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut sources = Vec::new();

        let global = match global_path.filter(|p| p.exists()) {
            Some(path) => {
                sources.push(path.to_path_buf());
                read_toml::<GlobalConfig>(path)?
            }
            None => GlobalConfig::default(),
        };

        let repo = match repo_path.filter(|p| p.exists()) {
            Some(path) => {
                sources.push(path.to_path_buf());
                Some(read_toml::<RepoConfig>(path)?)
            }
            None => None,
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        tracing::debug!(sources = ?sources, "loaded configuration");

        Ok(ConfigLoadResult {
            config: Config { global, repo },
            sources,
        })
    }

    /// Locate the global config file.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("depbot/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".depbot/config.toml"))
            .filter(|p| p.exists())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Hosting provider name. Defaults to "github".
    pub fn platform(&self) -> &str {
        self.global.platform.as_deref().unwrap_or("github")
    }

    /// Provider API endpoint, if configured.
    pub fn endpoint(&self) -> Option<&str> {
        self.global.endpoint.as_deref()
    }

    /// Username the bot acts as, if configured.
    pub fn username(&self) -> Option<&str> {
        self.global.username.as_deref()
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Configured base branch override.
    pub fn base_branch(&self) -> Option<&str> {
        self.repo.as_ref().and_then(|r| r.base_branch.as_deref())
    }

    /// Identity for bot commits.
    ///
    /// Values are validated at load time; an unparseable value here can only
    /// come from a hand-built `Config` and falls back to the default identity.
    pub fn git_author(&self) -> GitAuthor {
        self.repo
            .as_ref()
            .and_then(|r| r.git_author.as_deref())
            .or(self.global.git_author.as_deref())
            .and_then(|raw| GitAuthor::parse(raw).ok())
            .unwrap_or_else(GitAuthor::bot_default)
    }

    /// Emails whose commits never count as external modification.
    pub fn ignored_authors(&self) -> Vec<String> {
        let mut authors: Vec<String> = self.global.ignored_authors.clone().unwrap_or_default();
        if let Some(extra) = self.repo.as_ref().and_then(|r| r.ignored_authors.as_ref()) {
            for email in extra {
                if !authors.iter().any(|a| a.eq_ignore_ascii_case(email)) {
                    authors.push(email.clone());
                }
            }
        }
        authors
    }

    /// Prefix of status-check contexts created by the bot.
    pub fn internal_check_prefix(&self) -> &str {
        self.global
            .internal_check_prefix
            .as_deref()
            .unwrap_or(DEFAULT_INTERNAL_CHECK_PREFIX)
    }

    /// Configured cache directory override.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.global.cache_dir.as_deref()
    }

    /// Arguments for `Platform::init_platform` from the configured identity.
    ///
    /// Only an explicitly configured git author is passed, so the provider
    /// can fall back to the account's own identity.
    pub fn platform_params(&self, token: Option<String>) -> PlatformParams {
        let git_author = self
            .repo
            .as_ref()
            .and_then(|r| r.git_author.clone())
            .or_else(|| self.global.git_author.clone());
        PlatformParams {
            endpoint: self.endpoint().map(String::from),
            token,
            username: self.username().map(String::from),
            password: None,
            git_author,
        }
    }

    /// Provider token from the environment.
    pub fn token() -> Option<String> {
        std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty())
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
