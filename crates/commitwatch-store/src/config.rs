use std::collections::HashSet;
use std::time::Duration;

use commitwatch_core::{ConfigError, ReconcilePolicy, WatchedProjectSpec};
use serde::Deserialize;

use crate::paths::WatchPaths;

/// Environment fallback for the GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Typed view of `config.json`. The `notify_channels` key is read separately
/// by the notification crate.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub github: GithubConfig,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
    pub watchers: Vec<WatchedProjectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl GithubConfig {
    /// Token from the config file, else from `GITHUB_TOKEN`. `None` means
    /// unauthenticated requests.
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()))
    }
}

/// Sliding-window call budget. Defaults match GitHub's unauthenticated quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_quota")]
    pub quota: usize,
    #[serde(default = "default_window_min")]
    pub window_min: u64,
}

fn default_quota() -> usize {
    60
}

fn default_window_min() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            window_min: default_window_min(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_min.saturating_mul(60))
    }
}

/// Load and validate `config.json` from the prefix.
pub fn load_config(paths: &WatchPaths) -> Result<AppConfig, ConfigError> {
    let path = &paths.config_json;
    if !path.exists() {
        return Err(ConfigError::Missing(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("reading {}: {e}", path.display())))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(json: &str) -> Result<AppConfig, ConfigError> {
    // Step 1: raw parse, so missing sections get a precise error
    let raw: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    for section in ["github", "watchers"] {
        if raw.get(section).is_none() {
            return Err(ConfigError::MissingSection(section));
        }
    }

    // Step 2: typed deserialize
    let config: AppConfig =
        serde_json::from_value(raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;

    // Step 3: constraints
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let limit = &config.github.rate_limit;
    if limit.quota == 0 {
        return Err(ConfigError::Invalid(
            "github.rate_limit.quota must be greater than zero".into(),
        ));
    }
    if limit.window_min == 0 {
        return Err(ConfigError::Invalid(
            "github.rate_limit.window_min must be greater than zero".into(),
        ));
    }

    let mut seen = HashSet::new();
    for w in &config.watchers {
        if !seen.insert(&w.project) {
            return Err(ConfigError::DuplicateProject(w.project.clone()));
        }
        if w.scan_interval_min == 0 {
            return Err(ConfigError::InvalidInterval(w.project.clone()));
        }
    }
    Ok(())
}
