//! Cache identities for GitHub data.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::{CacheKey, CacheManager, EntryKind};
use crate::config::CacheConfig;

/// Open the GitHub-domain cache (activity, PRs, issues) at the configured root.
pub fn open_cache(config: &CacheConfig) -> Result<CacheManager> {
  CacheManager::open(config.github_root()?, config.ttl.github_policy())
}

/// Identity of a comprehensive activity snapshot: one user over one date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityKey {
  pub username: String,
  pub start_date: String,
  pub end_date: String,
}

impl ActivityKey {
  pub fn new(
    username: impl Into<String>,
    start_date: impl Into<String>,
    end_date: impl Into<String>,
  ) -> Self {
    Self {
      username: username.into(),
      start_date: start_date.into(),
      end_date: end_date.into(),
    }
  }

  fn raw(&self) -> String {
    format!("{}_{}_{}", self.username, self.start_date, self.end_date)
  }
}

impl CacheKey for ActivityKey {
  fn kind(&self) -> EntryKind {
    EntryKind::Activity
  }

  /// First 8 bytes of the SHA-256 of `username_start_end`, hex encoded.
  fn file_name(&self) -> String {
    let digest = Sha256::digest(self.raw().as_bytes());
    format!("{}.json", hex::encode(&digest[..8]))
  }

  fn description(&self) -> String {
    self.raw()
  }
}

/// Identity of a cached pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestKey {
  pub owner: String,
  pub repo: String,
  pub number: String,
}

/// Identity of a cached issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueKey {
  pub owner: String,
  pub repo: String,
  pub number: String,
}

macro_rules! repo_item_key {
  ($name:ident, $kind:expr) => {
    impl $name {
      pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: impl ToString) -> Self {
        Self {
          owner: owner.into(),
          repo: repo.into(),
          number: number.to_string(),
        }
      }
    }

    impl CacheKey for $name {
      fn kind(&self) -> EntryKind {
        $kind
      }

      fn file_name(&self) -> String {
        format!("{}_{}_{}.json", self.owner, self.repo, self.number)
      }

      fn description(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
      }
    }
  };
}

repo_item_key!(PullRequestKey, EntryKind::PullRequest);
repo_item_key!(IssueKey, EntryKind::Issue);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheManager, EntryStore, TtlPolicy};
  use crate::github::types::{ComprehensiveUserActivity, PullRequest, UserPullRequest};
  use tempfile::TempDir;

  #[test]
  fn test_activity_file_name_is_truncated_sha256() {
    let key = ActivityKey::new("alice", "2025-01-01", "2025-01-07");
    assert_eq!(key.file_name(), "548e3d5b50542a7f.json");
    assert_eq!(key.description(), "alice_2025-01-01_2025-01-07");
    assert_eq!(EntryStore::relative_path(&key), "activity/548e3d5b50542a7f.json");
  }

  #[test]
  fn test_repo_item_paths() {
    let pr = PullRequestKey::new("k8s", "k8s", 100);
    let issue = IssueKey::new("k8s", "k8s", "100");

    assert_eq!(EntryStore::relative_path(&pr), "prs/k8s_k8s_100.json");
    assert_eq!(EntryStore::relative_path(&issue), "issues/k8s_k8s_100.json");
    assert_eq!(pr.description(), "k8s/k8s#100");
  }

  #[test]
  fn test_pull_request_round_trip() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::open(dir.path(), TtlPolicy::github()).unwrap();
    let key = PullRequestKey::new("k8s", "k8s", 100);
    let pr = PullRequest {
      number: 100,
      title: "fix bug".to_string(),
      ..Default::default()
    };

    cache.set(&key, &pr).unwrap();

    let cached: PullRequest = cache.get(&key).unwrap();
    assert_eq!(cached.title, "fix bug");
    assert_eq!(cached, pr);
    // The same number under the issue kind is a different entry.
    assert!(cache.get::<_, PullRequest>(&IssueKey::new("k8s", "k8s", 100)).is_none());
  }

  #[test]
  fn test_reads_pull_request_written_by_earlier_release() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::open(dir.path(), TtlPolicy::github()).unwrap();
    let key = PullRequestKey::new("k8s", "k8s", 100);
    cache.set(&key, &PullRequest::default()).unwrap();

    let blob = format!(
      r#"{{"data":{{"number":100,"title":"fix bug","body":"","state":"closed","user":{{"login":"alice","id":1}},"created_at":"","updated_at":"","merged_at":"","commits":1,"additions":1,"deletions":0,"changed_files":1,"review_comments":3}},"timestamp":"{}","owner":"k8s","repo":"k8s","number":"100"}}"#,
      chrono::Utc::now().to_rfc3339()
    );
    std::fs::write(dir.path().join("prs").join("k8s_k8s_100.json"), blob).unwrap();

    let cached: PullRequest = cache.get(&key).unwrap();
    assert_eq!(cached.title, "fix bug");
    assert_eq!(cached.review_comments_count, 3);
  }

  #[test]
  fn test_activity_ranges_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::open(dir.path(), TtlPolicy::github()).unwrap();
    let first = ActivityKey::new("alice", "2025-01-01", "2025-01-07");
    let second = ActivityKey::new("alice", "2025-01-08", "2025-01-14");

    let activity = |title: &str| ComprehensiveUserActivity {
      username: "alice".to_string(),
      pull_requests: vec![UserPullRequest {
        number: 1,
        title: title.to_string(),
        ..Default::default()
      }],
      ..Default::default()
    };
    cache.set(&first, &activity("week one")).unwrap();
    cache.set(&second, &activity("week two")).unwrap();

    assert_eq!(cache.stats().count(EntryKind::Activity), 2);
    assert_eq!(std::fs::read_dir(dir.path().join("activity")).unwrap().count(), 2);

    let cached: ComprehensiveUserActivity = cache.get(&first).unwrap();
    assert_eq!(cached.pull_requests[0].title, "week one");
    assert_eq!(cached.total(), 1);
  }
}
