//! platform::factory
//!
//! Platform selection and creation.
//!
//! Callers use [`create_platform`] rather than naming adapter types, so the
//! rest of the bot depends on the [`Platform`] trait only.

use super::github::GitHubPlatform;
use crate::core::config::Config;
use super::mock::MockPlatform;
use super::traits::{Platform, PlatformError};

/// Supported hosting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformProvider {
    GitHub,
    /// In-memory provider for tests and dry runs.
    Mock,
}

impl PlatformProvider {
    /// Get all available providers.
    ///
    /// # Example
    ///
    /// ```
    /// use depbot::platform::PlatformProvider;
    ///
    /// assert!(PlatformProvider::all().contains(&PlatformProvider::GitHub));
    /// ```
    pub fn all() -> &'static [PlatformProvider] {
        &[PlatformProvider::GitHub, PlatformProvider::Mock]
    }

    /// The name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            PlatformProvider::GitHub => "github",
            PlatformProvider::Mock => "mock",
        }
    }

    /// Parse a provider name, case-insensitively.
    ///
    /// ```
    /// use depbot::platform::PlatformProvider;
    ///
    /// assert_eq!(PlatformProvider::parse("GitHub"), Some(PlatformProvider::GitHub));
    /// assert_eq!(PlatformProvider::parse("gitea"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(PlatformProvider::GitHub),
            "mock" => Some(PlatformProvider::Mock),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlatformProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Names accepted by [`create_platform`] and the `platform` config key.
pub fn valid_platform_names() -> Vec<&'static str> {
    PlatformProvider::all().iter().map(|p| p.name()).collect()
}

/// Create a platform adapter by provider name.
///
/// # Errors
///
/// Unknown provider names and malformed endpoints are rejected as
/// [`PlatformError::Conflict`].
///
/// # Example
///
/// ```
/// use depbot::platform::create_platform;
///
/// let platform = create_platform("mock", None, None).unwrap();
/// assert_eq!(platform.name(), "mock");
/// assert!(create_platform("svn", None, None).is_err());
/// ```
pub fn create_platform(
    name: &str,
    endpoint: Option<&str>,
    token: Option<String>,
) -> Result<Box<dyn Platform>, PlatformError> {
    Ok(match provider_named(name)? {
        PlatformProvider::GitHub => Box::new(GitHubPlatform::new(endpoint, token)?),
        PlatformProvider::Mock => Box::new(MockPlatform::new()),
    })
}

/// Create the adapter selected by `config`.
///
/// The configured endpoint and status-check prefix are applied; the
/// username and git author reach the adapter through
/// [`Config::platform_params`] at `init_platform`. `token` normally comes
/// from [`Config::token`].
pub fn create_configured_platform(
    config: &Config,
    token: Option<String>,
) -> Result<Box<dyn Platform>, PlatformError> {
    let prefix = config.internal_check_prefix();
    Ok(match provider_named(config.platform())? {
        PlatformProvider::GitHub => Box::new(
            GitHubPlatform::new(config.endpoint(), token)?.with_internal_check_prefix(prefix),
        ),
        PlatformProvider::Mock => Box::new(MockPlatform::new().with_internal_check_prefix(prefix)),
    })
}

fn provider_named(name: &str) -> Result<PlatformProvider, PlatformError> {
    PlatformProvider::parse(name).ok_or_else(|| {
        PlatformError::Conflict(format!(
            "unknown platform '{}', expected one of: {}",
            name,
            valid_platform_names().join(", ")
        ))
    })
}
