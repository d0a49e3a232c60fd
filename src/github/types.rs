use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub login: String,
  #[serde(default)]
  pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
  pub name: String,
  #[serde(default)]
  pub color: String,
}

/// Pull request details, including the review context fetched alongside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub user: User,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
  #[serde(default)]
  pub merged_at: Option<String>,
  #[serde(default)]
  pub commits: u32,
  #[serde(default)]
  pub additions: u32,
  #[serde(default)]
  pub deletions: u32,
  #[serde(default)]
  pub changed_files: u32,
  /// Count reported by the API
  #[serde(default, rename = "review_comments")]
  pub review_comments_count: u32,
  #[serde(default, rename = "review_comment_details")]
  pub review_comments: Vec<ReviewComment>,
  #[serde(default)]
  pub files_changed: Vec<FileChange>,
  #[serde(default)]
  pub code_diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
  pub id: u64,
  pub user: User,
  pub body: String,
  #[serde(default)]
  pub path: String,
  #[serde(default)]
  pub line: Option<u32>,
  #[serde(default)]
  pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
  pub filename: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub additions: u32,
  #[serde(default)]
  pub deletions: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub patch: Option<String>,
}

/// Issue details, including their comment thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub user: User,
  #[serde(default)]
  pub labels: Vec<Label>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
  #[serde(default)]
  pub closed_at: Option<String>,
  /// Count reported by the API
  #[serde(default, rename = "comments")]
  pub comments_count: u32,
  #[serde(default, rename = "comment_details")]
  pub comments: Vec<IssueComment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
  pub id: u64,
  pub user: User,
  pub body: String,
  #[serde(default)]
  pub created_at: String,
}

/// Everything a user did on GitHub in a date range, gathered from several APIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveUserActivity {
  pub username: String,
  #[serde(default)]
  pub events: Vec<UserEvent>,
  #[serde(default)]
  pub pull_requests: Vec<UserPullRequest>,
  #[serde(default)]
  pub issues: Vec<UserIssue>,
}

impl ComprehensiveUserActivity {
  pub fn total(&self) -> usize {
    self.events.len() + self.pull_requests.len() + self.issues.len()
  }
}

/// Entry from the user events API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
  #[serde(rename = "type")]
  pub event_type: String,
  pub created_at: String,
  pub repo: Repo,
  #[serde(default)]
  pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
  pub name: String,
  #[serde(default)]
  pub url: String,
}

/// Pull request as returned by the search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPullRequest {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
  #[serde(default)]
  pub html_url: String,
  #[serde(default)]
  pub repository_url: String,
}

/// Issue as returned by the search API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIssue {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
  #[serde(default)]
  pub html_url: String,
  #[serde(default)]
  pub repository_url: String,
}
