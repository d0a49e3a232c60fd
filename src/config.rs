use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cache::{CacheLayer, EntryKind, TtlPolicy};

/// Environment variable that overrides the cache root.
pub const CACHE_DIR_ENV: &str = "PERFDIVE_CACHE_DIR";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Set to false to bypass the cache entirely
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// Cache root (default: ~/.perfdive/cache)
  pub dir: Option<PathBuf>,
  #[serde(default)]
  pub ttl: TtlConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: default_enabled(),
      dir: None,
      ttl: TtlConfig::default(),
    }
  }
}

fn default_enabled() -> bool {
  true
}

/// Longest accepted TTL (about 100 years); larger values are clamped.
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// TTLs in seconds, per cached kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
  pub activity: u64,
  pub pull_request: u64,
  pub issue: u64,
  pub jira_issue: u64,
}

impl Default for TtlConfig {
  fn default() -> Self {
    let secs = |kind: EntryKind| kind.default_ttl().num_seconds().unsigned_abs();
    Self {
      activity: secs(EntryKind::Activity),
      pull_request: secs(EntryKind::PullRequest),
      issue: secs(EntryKind::Issue),
      jira_issue: secs(EntryKind::JiraIssue),
    }
  }
}

impl TtlConfig {
  fn duration(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or_default())
  }

  /// TTL table for the GitHub-domain cache.
  pub fn github_policy(&self) -> TtlPolicy {
    TtlPolicy::github()
      .with(EntryKind::Activity, Self::duration(self.activity))
      .with(EntryKind::PullRequest, Self::duration(self.pull_request))
      .with(EntryKind::Issue, Self::duration(self.issue))
  }

  /// TTL table for the Jira-domain cache.
  pub fn jira_policy(&self) -> TtlPolicy {
    TtlPolicy::jira().with(EntryKind::JiraIssue, Self::duration(self.jira_issue))
  }
}

impl CacheConfig {
  /// Resolve the cache root.
  ///
  /// Order: `PERFDIVE_CACHE_DIR`, `cache.dir` from the config file,
  /// `~/.perfdive/cache`, then the OS cache directory.
  pub fn root(&self) -> Result<PathBuf> {
    Self::resolve_root(std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from), self.dir.clone())
  }

  fn resolve_root(env_dir: Option<PathBuf>, config_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = env_dir.filter(|p| !p.as_os_str().is_empty()) {
      return Ok(dir);
    }
    if let Some(dir) = config_dir {
      return Ok(dir);
    }

    dirs::home_dir()
      .map(|home| home.join(".perfdive").join("cache"))
      .or_else(|| dirs::cache_dir().map(|dir| dir.join("perfdive")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))
  }

  /// Root of the GitHub-domain cache.
  pub fn github_root(&self) -> Result<PathBuf> {
    self.root()
  }

  /// Root of the Jira-domain cache, nested under the GitHub root.
  pub fn jira_root(&self) -> Result<PathBuf> {
    Ok(self.root()?.join("jira"))
  }

  /// Cache layer for the GitHub client.
  ///
  /// Disabled when caching is turned off or the cache cannot be opened.
  pub fn github_layer(&self) -> CacheLayer {
    self.layer(self.github_root(), self.ttl.github_policy())
  }

  /// Cache layer for the Jira client.
  pub fn jira_layer(&self) -> CacheLayer {
    self.layer(self.jira_root(), self.ttl.jira_policy())
  }

  fn layer(&self, root: Result<PathBuf>, policy: TtlPolicy) -> CacheLayer {
    if !self.enabled {
      return CacheLayer::disabled();
    }
    match root {
      Ok(root) => CacheLayer::open_or_disabled(root, policy),
      Err(e) => {
        warn!(error = %e, "Cache unavailable, continuing without it");
        CacheLayer::disabled()
      }
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./perfdive.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/perfdive/config.yaml
  /// 4. ~/.perfdive.yaml
  ///
  /// With no file anywhere, defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("perfdive.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("perfdive").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    let home_path = dirs::home_dir()?.join(".perfdive.yaml");
    home_path.exists().then_some(home_path)
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file parses as null rather than an empty mapping.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }
}
