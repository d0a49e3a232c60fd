//! Item kinds and the TTL table that governs them.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use color_eyre::{eyre::eyre, Report};

/// Category of a cached item. Decides the TTL and the subdirectory holding the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntryKind {
  /// Comprehensive GitHub user activity for a date range
  #[serde(rename = "activity")]
  Activity,
  /// GitHub pull request details
  #[serde(rename = "pr")]
  PullRequest,
  /// GitHub issue details
  #[serde(rename = "issue")]
  Issue,
  /// Jira issue details
  #[serde(rename = "jira-issue")]
  JiraIssue,
}

impl EntryKind {
  pub const ALL: [EntryKind; 4] = [
    EntryKind::Activity,
    EntryKind::PullRequest,
    EntryKind::Issue,
    EntryKind::JiraIssue,
  ];

  /// Name used in the metadata document and on the command line.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Activity => "activity",
      Self::PullRequest => "pr",
      Self::Issue => "issue",
      Self::JiraIssue => "jira-issue",
    }
  }

  /// Name written to the `type` field of a metadata document.
  ///
  /// Jira issues are recorded as plain `issue` in the Jira-domain document;
  /// each domain keeps its own document, so the name is not ambiguous there.
  pub fn metadata_type(&self) -> &'static str {
    match self {
      Self::JiraIssue => "issue",
      other => other.as_str(),
    }
  }

  /// Kind named by a metadata `type` field. `issue` reads as the GitHub kind;
  /// [`TtlPolicy::resolve`] moves it to the Jira kind inside a Jira cache.
  pub fn from_metadata_type(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.as_str() == name)
  }

  /// Subdirectory under the manager root, or `None` for a flat layout.
  pub fn subdir(&self) -> Option<&'static str> {
    match self {
      Self::Activity => Some("activity"),
      Self::PullRequest => Some("prs"),
      Self::Issue => Some("issues"),
      Self::JiraIssue => None,
    }
  }

  pub fn default_ttl(&self) -> Duration {
    match self {
      Self::Activity => Duration::hours(1),
      Self::PullRequest | Self::Issue | Self::JiraIssue => Duration::hours(24),
    }
  }
}

impl fmt::Display for EntryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntryKind {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    EntryKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| eyre!("Unknown cache kind '{}'", s))
  }
}

/// Maps each kind a manager handles to its TTL.
///
/// The set of kinds in the policy is also the set of kinds the manager owns:
/// `Clear`, `Stats` and index loading only consider these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
  ttls: BTreeMap<EntryKind, Duration>,
}

impl TtlPolicy {
  pub fn new() -> Self {
    Self {
      ttls: BTreeMap::new(),
    }
  }

  /// Policy for the GitHub-domain cache: activity, PRs and issues.
  pub fn github() -> Self {
    Self::new()
      .with(EntryKind::Activity, EntryKind::Activity.default_ttl())
      .with(EntryKind::PullRequest, EntryKind::PullRequest.default_ttl())
      .with(EntryKind::Issue, EntryKind::Issue.default_ttl())
  }

  /// Policy for the Jira-domain cache.
  pub fn jira() -> Self {
    Self::new().with(EntryKind::JiraIssue, EntryKind::JiraIssue.default_ttl())
  }

  /// Add or replace the TTL for a kind.
  pub fn with(mut self, kind: EntryKind, ttl: Duration) -> Self {
    self.ttls.insert(kind, ttl);
    self
  }

  pub fn ttl(&self, kind: EntryKind) -> Option<Duration> {
    self.ttls.get(&kind).copied()
  }

  pub fn contains(&self, kind: EntryKind) -> bool {
    self.ttls.contains_key(&kind)
  }

  /// The managed kind a loaded metadata entry of `kind` belongs to, if any:
  /// `kind` itself, or the managed kind sharing its metadata `type` name.
  pub fn resolve(&self, kind: EntryKind) -> Option<EntryKind> {
    if self.contains(kind) {
      return Some(kind);
    }
    // Only an ambiguous `type` name (as read from disk) can be moved.
    if kind.metadata_type() != kind.as_str() {
      return None;
    }
    self
      .kinds()
      .find(|managed| managed.metadata_type() == kind.metadata_type())
  }

  pub fn kinds(&self) -> impl Iterator<Item = EntryKind> + '_ {
    self.ttls.keys().copied()
  }
}

impl Default for TtlPolicy {
  fn default() -> Self {
    Self::new()
  }
}
