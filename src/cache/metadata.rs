//! Metadata index: which blobs exist and when they expire.
//!
//! The index is the source of truth for expiration. It lives in memory for the
//! life of its manager and is mirrored to a single JSON document:
//!
//! ```json
//! { "entries": { "prs/k8s_k8s_100.json": { "created": "...", "expires": "...", "type": "pr", "key": "k8s/k8s#100" } } }
//! ```

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::kind::EntryKind;
use super::store::write_atomic;

/// Expiration record for one cached blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
  pub created: DateTime<Utc>,
  pub expires: DateTime<Utc>,
  #[serde(rename = "type", with = "metadata_type")]
  pub kind: EntryKind,
  /// Human-readable identity, diagnostics only
  pub key: String,
}

impl MetadataEntry {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now > self.expires
  }
}

/// `type` uses the document names (`activity`, `pr`, `issue`), shared with
/// caches written by earlier perfdive releases.
mod metadata_type {
  use serde::{de, Deserialize, Deserializer, Serializer};

  use crate::cache::kind::EntryKind;

  pub fn serialize<S: Serializer>(kind: &EntryKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.metadata_type())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EntryKind, D::Error> {
    let name = String::deserialize(deserializer)?;
    EntryKind::from_metadata_type(&name).ok_or_else(|| {
      de::Error::unknown_variant(&name, &["activity", "pr", "issue", "jira-issue"])
    })
  }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
  #[serde(default)]
  entries: BTreeMap<String, MetadataEntry>,
}

/// In-memory index keyed by relative storage path, plus the document it mirrors.
#[derive(Debug)]
pub struct MetadataIndex {
  path: PathBuf,
  entries: BTreeMap<String, MetadataEntry>,
}

impl MetadataIndex {
  /// Empty index that will be saved to `path`.
  pub fn empty(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      entries: BTreeMap::new(),
    }
  }

  /// Load the index from `path`.
  ///
  /// A missing or unparseable document yields an empty index; this never fails.
  pub fn load(path: impl Into<PathBuf>) -> Self {
    let path = path.into();

    let contents = match std::fs::read_to_string(&path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "No cache metadata yet, starting fresh");
        return Self::empty(path);
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Failed to read cache metadata, starting fresh");
        return Self::empty(path);
      }
    };

    match serde_json::from_str::<MetadataDocument>(&contents) {
      Ok(doc) => Self {
        path,
        entries: doc.entries,
      },
      Err(e) => {
        warn!(path = %path.display(), error = %e, "Cache metadata corrupted, starting fresh");
        Self::empty(path)
      }
    }
  }

  /// Write the full index to its document, replacing it atomically.
  pub fn save(&self) -> Result<()> {
    let doc = MetadataDocument {
      entries: self.entries.clone(),
    };
    let data = serde_json::to_vec_pretty(&doc)
      .map_err(|e| eyre!("Failed to serialize cache metadata: {}", e))?;

    write_atomic(&self.path, &data)
  }

  /// Insert or overwrite the entry for `path`, created at `now`.
  pub fn put(
    &mut self,
    path: &str,
    kind: EntryKind,
    key: &str,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> MetadataEntry {
    let entry = MetadataEntry {
      created: now,
      expires: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
      kind,
      key: key.to_string(),
    };
    self.entries.insert(path.to_string(), entry.clone());
    entry
  }

  pub fn get(&self, path: &str) -> Option<&MetadataEntry> {
    self.entries.get(path)
  }

  /// Unknown paths count as expired.
  pub fn is_expired(&self, path: &str, now: DateTime<Utc>) -> bool {
    self
      .entries
      .get(path)
      .map_or(true, |entry| entry.is_expired(now))
  }

  pub fn remove(&mut self, path: &str) -> Option<MetadataEntry> {
    self.entries.remove(path)
  }

  /// Drop every expired entry and return their paths so the blobs can be deleted.
  pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<String> {
    let expired: Vec<String> = self
      .entries
      .iter()
      .filter(|(_, entry)| entry.is_expired(now))
      .map(|(path, _)| path.clone())
      .collect();

    for path in &expired {
      self.entries.remove(path);
    }

    expired
  }

  /// Drop every entry of `kind`, returning their paths.
  pub fn remove_kind(&mut self, kind: EntryKind) -> Vec<String> {
    let paths: Vec<String> = self
      .entries
      .iter()
      .filter(|(_, entry)| entry.kind == kind)
      .map(|(path, _)| path.clone())
      .collect();

    for path in &paths {
      self.entries.remove(path);
    }

    paths
  }

  /// Re-kind every entry through `resolve`, dropping those it rejects.
  /// Returns how many were dropped.
  pub fn resolve_kinds(&mut self, mut resolve: impl FnMut(EntryKind) -> Option<EntryKind>) -> usize {
    let before = self.entries.len();
    self.entries.retain(|_, entry| match resolve(entry.kind) {
      Some(kind) => {
        entry.kind = kind;
        true
      }
      None => false,
    });
    before - self.entries.len()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn entries(&self) -> impl Iterator<Item = (&String, &MetadataEntry)> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
  }

  #[test]
  fn test_unknown_path_is_expired() {
    let index = MetadataIndex::empty("/nonexistent/metadata.json");
    assert!(index.is_expired("prs/a_b_1.json", Utc::now()));
  }

  #[test]
  fn test_put_then_expire() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    let now = ts("2025-01-01T00:00:00Z");
    let entry = index.put("prs/a_b_1.json", EntryKind::PullRequest, "a/b#1", Duration::hours(24), now);

    assert_eq!(entry.expires, ts("2025-01-02T00:00:00Z"));
    assert!(!index.is_expired("prs/a_b_1.json", now));
    assert!(!index.is_expired("prs/a_b_1.json", ts("2025-01-02T00:00:00Z")));
    assert!(index.is_expired("prs/a_b_1.json", ts("2025-01-02T00:00:01Z")));
  }

  #[test]
  fn test_put_overwrites() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    let first = ts("2025-01-01T00:00:00Z");
    let second = ts("2025-01-01T06:00:00Z");

    index.put("a.json", EntryKind::JiraIssue, "A-1", Duration::hours(1), first);
    index.put("a.json", EntryKind::JiraIssue, "A-1", Duration::hours(1), second);

    assert_eq!(index.len(), 1);
    assert_eq!(index.get("a.json").unwrap().created, second);
  }

  #[test]
  fn test_remove_absent_is_noop() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    assert!(index.remove("missing.json").is_none());
    assert!(index.is_empty());
  }

  #[test]
  fn test_sweep_removes_only_expired() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    let created = ts("2025-01-01T00:00:00Z");
    index.put("activity/a.json", EntryKind::Activity, "a", Duration::hours(1), created);
    index.put("activity/b.json", EntryKind::Activity, "b", Duration::hours(1), created);
    index.put("prs/c.json", EntryKind::PullRequest, "c", Duration::hours(24), created);

    let now = ts("2025-01-01T02:00:00Z");
    let mut removed = index.sweep(now);
    removed.sort();

    assert_eq!(removed, vec!["activity/a.json", "activity/b.json"]);
    assert_eq!(index.len(), 1);
    assert!(index.sweep(now).is_empty());
  }

  #[test]
  fn test_remove_kind() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    let now = Utc::now();
    index.put("prs/a.json", EntryKind::PullRequest, "a", Duration::hours(1), now);
    index.put("issues/a.json", EntryKind::Issue, "a", Duration::hours(1), now);

    assert_eq!(index.remove_kind(EntryKind::PullRequest), vec!["prs/a.json"]);
    assert_eq!(index.len(), 1);
  }

  #[test]
  fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");
    let now = ts("2025-03-04T05:06:07Z");

    let mut index = MetadataIndex::empty(&path);
    index.put("PROJ-1.json", EntryKind::JiraIssue, "PROJ-1", Duration::hours(24), now);
    index.save().unwrap();

    let loaded = MetadataIndex::load(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get("PROJ-1.json"), index.get("PROJ-1.json"));
  }

  #[test]
  fn test_document_shape() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");

    let mut index = MetadataIndex::empty(&path);
    index.put("prs/k8s_k8s_100.json", EntryKind::PullRequest, "k8s/k8s#100", Duration::hours(24), Utc::now());
    index.save().unwrap();

    let doc: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &doc["entries"]["prs/k8s_k8s_100.json"];
    assert_eq!(entry["type"], "pr");
    assert_eq!(entry["key"], "k8s/k8s#100");
    assert!(entry["created"].is_string());
    assert!(entry["expires"].is_string());
  }

  #[test]
  fn test_load_missing_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let index = MetadataIndex::load(dir.path().join("metadata.json"));
    assert!(index.is_empty());
  }

  #[test]
  fn test_load_corrupted_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");
    std::fs::write(&path, b"{\"entries\": {\"x\": ").unwrap();

    let index = MetadataIndex::load(&path);
    assert!(index.is_empty());
  }

  #[test]
  fn test_jira_kind_is_written_as_issue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");

    let mut index = MetadataIndex::empty(&path);
    index.put("PROJ-1.json", EntryKind::JiraIssue, "PROJ-1", Duration::hours(24), Utc::now());
    index.save().unwrap();

    let doc: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(doc["entries"]["PROJ-1.json"]["type"], "issue");
  }

  #[test]
  fn test_resolve_kinds_moves_and_drops() {
    let mut index = MetadataIndex::empty("/nonexistent/metadata.json");
    let now = Utc::now();
    index.put("PROJ-1.json", EntryKind::Issue, "PROJ-1", Duration::hours(1), now);
    index.put("activity/a.json", EntryKind::Activity, "a", Duration::hours(1), now);

    let dropped = index.resolve_kinds(|kind| match kind {
      EntryKind::Issue => Some(EntryKind::JiraIssue),
      _ => None,
    });

    assert_eq!(dropped, 1);
    assert_eq!(index.get("PROJ-1.json").unwrap().kind, EntryKind::JiraIssue);
  }

  #[test]
  fn test_unknown_type_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");
    std::fs::write(
      &path,
      r#"{"entries":{"x.json":{"created":"2025-06-01T10:00:00Z","expires":"2025-06-01T11:00:00Z","type":"board","key":"x"}}}"#,
    )
    .unwrap();

    assert!(MetadataIndex::load(&path).is_empty());
  }

  #[test]
  fn test_loads_go_style_timestamps() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metadata.json");
    std::fs::write(
      &path,
      r#"{"entries":{"activity/0011223344556677.json":{"created":"2025-06-01T10:00:00.123456789-04:00","expires":"2025-06-01T11:00:00.123456789-04:00","type":"activity","key":"alice_2025-06-01_2025-06-07"}}}"#,
    )
    .unwrap();

    let index = MetadataIndex::load(&path);
    let entry = index.get("activity/0011223344556677.json").unwrap();
    assert_eq!(entry.kind, EntryKind::Activity);
    assert_eq!(entry.expires - entry.created, Duration::hours(1));
  }
}
