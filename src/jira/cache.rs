//! Caching implementations for Jira types.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::cache::{CacheKey, CacheManager, EntryKind};
use crate::config::CacheConfig;

use super::types::Issue;

/// Identity of a cached Jira issue: the issue key itself (e.g. `PROJ-1234`).
///
/// Issue keys are already filesystem-safe, so the file name is the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JiraIssueKey {
  pub issue_key: String,
}

impl JiraIssueKey {
  pub fn new(issue_key: impl Into<String>) -> Self {
    Self {
      issue_key: issue_key.into(),
    }
  }
}

impl CacheKey for JiraIssueKey {
  fn kind(&self) -> EntryKind {
    EntryKind::JiraIssue
  }

  fn file_name(&self) -> String {
    format!("{}.json", self.issue_key)
  }

  fn description(&self) -> String {
    self.issue_key.clone()
  }
}

/// Open the Jira-domain cache at `<cache root>/jira`.
pub fn open_cache(config: &CacheConfig) -> Result<CacheManager> {
  CacheManager::open(config.jira_root()?, config.ttl.jira_policy())
}

/// Look up a single issue.
pub fn cached_issue(cache: &CacheManager, issue_key: &str) -> Option<Issue> {
  cache.get(&JiraIssueKey::new(issue_key))
}

/// Store an issue under its own key. Issues without a key are rejected.
pub fn store_issue(cache: &CacheManager, issue: &Issue) -> Result<()> {
  if issue.key.is_empty() {
    return Err(eyre!("Invalid issue: missing key"));
  }
  cache.set(&JiraIssueKey::new(&issue.key), issue)
}

/// Split `issue_keys` into issues found in the cache and keys that must be fetched.
///
/// Missing keys keep their input order.
pub fn cached_issues<S: AsRef<str>>(
  cache: &CacheManager,
  issue_keys: &[S],
) -> (HashMap<String, Issue>, Vec<String>) {
  let mut found = HashMap::new();
  let mut missing = Vec::new();

  for key in issue_keys {
    let key = key.as_ref();
    match cached_issue(cache, key) {
      Some(issue) => {
        found.insert(key.to_string(), issue);
      }
      None => missing.push(key.to_string()),
    }
  }

  (found, missing)
}

/// Store every issue, skipping (and logging) the ones that fail. Returns how many were stored.
pub fn store_issues(cache: &CacheManager, issues: &[Issue]) -> usize {
  issues
    .iter()
    .filter(|issue| match store_issue(cache, issue) {
      Ok(()) => true,
      Err(e) => {
        warn!(key = %issue.key, error = %e, "Failed to cache issue");
        false
      }
    })
    .count()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::TtlPolicy;
  use tempfile::TempDir;

  fn open(dir: &TempDir) -> CacheManager {
    CacheManager::open(dir.path(), TtlPolicy::jira()).unwrap()
  }

  #[test]
  fn test_issue_is_stored_flat_by_key() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);

    store_issue(&cache, &Issue::new("PROJ-1", "Crash on start")).unwrap();

    let blob: serde_json::Value =
      serde_json::from_slice(&std::fs::read(dir.path().join("PROJ-1.json")).unwrap()).unwrap();
    assert_eq!(blob["issue_key"], "PROJ-1");
    assert_eq!(blob["data"]["summary"], "Crash on start");
    assert_eq!(
      cached_issue(&cache, "PROJ-1").unwrap().summary,
      "Crash on start"
    );
  }

  #[test]
  fn test_empty_key_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);
    assert!(store_issue(&cache, &Issue::new("", "no key")).is_err());
    assert_eq!(cache.stats().total, 0);
  }

  #[test]
  fn test_batch_lookup_splits_found_and_missing() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);

    let stored = store_issues(
      &cache,
      &[
        Issue::new("PROJ-1", "one"),
        Issue::new("", "invalid"),
        Issue::new("PROJ-3", "three"),
      ],
    );
    assert_eq!(stored, 2);

    let (found, missing) = cached_issues(&cache, &["PROJ-1", "PROJ-2", "PROJ-3", "PROJ-4"]);
    assert_eq!(found.len(), 2);
    assert_eq!(found["PROJ-3"].summary, "three");
    assert_eq!(missing, vec!["PROJ-2", "PROJ-4"]);
  }

  #[test]
  fn test_truncated_blob_is_removed() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);
    store_issue(&cache, &Issue::new("PROJ-9", "soon broken")).unwrap();

    let path = dir.path().join("PROJ-9.json");
    let contents = std::fs::read(&path).unwrap();
    std::fs::write(&path, &contents[..contents.len() / 2]).unwrap();

    assert!(cached_issue(&cache, "PROJ-9").is_none());
    assert_eq!(cache.stats().total, 0);
    assert!(!path.exists());
  }

  #[test]
  fn test_reads_blob_from_earlier_release() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);
    // Register the entry, then replace the blob with the older field layout.
    store_issue(&cache, &Issue::new("PROJ-5", "placeholder")).unwrap();
    let timestamp = chrono::Utc::now().to_rfc3339();
    let legacy = format!(
      r#"{{"data":{{"Key":"PROJ-5","Summary":"Old layout","Description":"","Status":"Done","Assignee":"Alice","Created":"2025-01-01T00:00:00Z","Updated":"2025-01-02T00:00:00Z","labels":["perf"]}},"timestamp":"{}","issue_key":"PROJ-5"}}"#,
      timestamp
    );
    std::fs::write(dir.path().join("PROJ-5.json"), legacy).unwrap();

    let issue = cached_issue(&cache, "PROJ-5").unwrap();
    assert_eq!(issue.summary, "Old layout");
    assert_eq!(issue.assignee, "Alice");
    assert_eq!(issue.labels, vec!["perf"]);
  }

  #[test]
  fn test_reads_cache_written_by_earlier_release() {
    let dir = TempDir::new().unwrap();
    let now = chrono::Utc::now();
    let metadata = format!(
      r#"{{"entries":{{"PROJ-1.json":{{"created":"{}","expires":"{}","type":"issue","key":"PROJ-1"}}}}}}"#,
      now.to_rfc3339(),
      (now + chrono::Duration::hours(24)).to_rfc3339()
    );
    std::fs::write(dir.path().join("metadata.json"), metadata).unwrap();
    let blob = format!(
      r#"{{"data":{{"Key":"PROJ-1","Summary":"Slow startup","Description":"","Status":"Open","Assignee":"","Created":"2025-01-01T00:00:00Z","Updated":"2025-01-02T00:00:00Z"}},"timestamp":"{}","issue_key":"PROJ-1"}}"#,
      now.to_rfc3339()
    );
    std::fs::write(dir.path().join("PROJ-1.json"), blob).unwrap();

    let cache = open(&dir);
    assert_eq!(cache.stats().count(EntryKind::JiraIssue), 1);
    assert_eq!(cached_issue(&cache, "PROJ-1").unwrap().summary, "Slow startup");
    assert!(dir.path().join("PROJ-1.json").exists());

    // Entries written now keep the same `type` name.
    store_issue(&cache, &Issue::new("PROJ-2", "two")).unwrap();
    let doc: serde_json::Value =
      serde_json::from_slice(&std::fs::read(dir.path().join("metadata.json")).unwrap()).unwrap();
    assert_eq!(doc["entries"]["PROJ-2.json"]["type"], "issue");
  }

  #[test]
  fn test_clear_keeps_metadata_document() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir);
    store_issues(&cache, &[Issue::new("A-1", "a"), Issue::new("A-2", "b")]);

    assert_eq!(cache.clear().unwrap(), 2);
    assert_eq!(cache.stats().total, 0);
    let remaining: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|entry| entry.unwrap().file_name())
      .collect();
    assert_eq!(remaining, vec![std::ffi::OsString::from("metadata.json")]);
  }
}
