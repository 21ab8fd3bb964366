//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$DEPBOT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/depbot/config.toml`
//! 3. `~/.depbot/config.toml`
//!
//! # Repo Config
//!
//! Located at `<git_dir>/depbot/config.toml`.
//!
//! Values are validated after parsing: the author must parse as
//! `Name <email>`, the platform must be a known provider name.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::GitAuthor;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// platform = "github"
/// endpoint = "https://api.github.com/"
/// username = "depbot"
/// git_author = "Depbot <bot@depbot.dev>"
/// ignored_authors = ["ci@example.com"]
/// internal_check_prefix = "depbot/"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Hosting provider (e.g., "github")
    pub platform: Option<String>,

    /// API endpoint of the provider
    pub endpoint: Option<String>,

    /// Username the bot acts as
    pub username: Option<String>,

    /// Identity used for bot commits
    pub git_author: Option<String>,

    /// Additional commit authors whose commits do not count as modifications
    pub ignored_authors: Option<Vec<String>>,

    /// Status-check context prefix identifying checks the bot creates
    pub internal_check_prefix: Option<String>,

    /// Directory for persisted caches
    pub cache_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(platform) = &self.platform {
            let valid = crate::platform::valid_platform_names();
            if !valid.contains(&platform.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid platform '{}', must be one of: {}",
                    platform,
                    valid.join(", ")
                )));
            }
        }

        if let Some(author) = &self.git_author {
            GitAuthor::parse(author).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        if let Some(prefix) = &self.internal_check_prefix {
            if prefix.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "internal_check_prefix cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "upstream"
/// base_branch = "develop"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote name (default: "origin")
    pub remote: Option<String>,

    /// Base branch when the provider's default branch is not wanted
    pub base_branch: Option<String>,

    /// Overrides the global author for this repository
    pub git_author: Option<String>,

    /// Appended to the global ignore list
    pub ignored_authors: Option<Vec<String>>,
}

impl RepoConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_branch {
            crate::core::types::BranchName::new(base.as_str())
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() || remote.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid remote name '{}'",
                    remote
                )));
            }
        }

        if let Some(author) = &self.git_author {
            GitAuthor::parse(author).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_parses_all_keys() {
        let toml = r#"
            platform = "github"
            endpoint = "https://ghe.example.com/api/v3/"
            username = "depbot"
            git_author = "Depbot <bot@depbot.dev>"
            ignored_authors = ["ci@example.com"]
            internal_check_prefix = "depbot/"
            cache_dir = "/tmp/depbot"
        "#;
        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.platform.as_deref(), Some("github"));
        assert_eq!(config.ignored_authors.as_ref().unwrap().len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn global_rejects_unknown_keys() {
        let result: Result<GlobalConfig, _> = toml::from_str("bogus = 1");
        assert!(result.is_err());
    }

    #[test]
    fn global_rejects_unknown_platform() {
        let config = GlobalConfig {
            platform: Some("sourceforge".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("sourceforge")
        ));
    }

    #[test]
    fn global_rejects_bad_author() {
        let config = GlobalConfig {
            git_author: Some("no email here".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn repo_rejects_bad_base_branch() {
        let config = RepoConfig {
            base_branch: Some("bad..name".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn repo_rejects_bad_remote() {
        let config = RepoConfig {
            remote: Some("two words".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
