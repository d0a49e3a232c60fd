//! Cached GitHub client that wraps an upstream source with transparent caching.

use color_eyre::Result;
use std::future::Future;
use tracing::info;

use crate::cache::CacheLayer;

use super::cache::{ActivityKey, IssueKey, PullRequestKey};
use super::types::{ComprehensiveUserActivity, Issue, PullRequest};

/// Upstream provider of GitHub data (normally the GitHub REST client).
pub trait GithubSource: Send + Sync {
  /// Events, authored PRs and issues for `username` between two `YYYY-MM-DD` dates.
  fn comprehensive_activity(
    &self,
    username: &str,
    start_date: &str,
    end_date: &str,
  ) -> impl Future<Output = Result<ComprehensiveUserActivity>> + Send;

  /// Pull request with its review comments, changed files and diff.
  fn pull_request(
    &self,
    owner: &str,
    repo: &str,
    number: &str,
  ) -> impl Future<Output = Result<PullRequest>> + Send;

  /// Issue with its comments.
  fn issue(&self, owner: &str, repo: &str, number: &str)
    -> impl Future<Output = Result<Issue>> + Send;
}

/// GitHub client with transparent caching support.
#[derive(Clone)]
pub struct CachedGithubClient<S> {
  inner: S,
  cache: CacheLayer,
}

impl<S: GithubSource> CachedGithubClient<S> {
  pub fn new(inner: S, cache: CacheLayer) -> Self {
    Self { inner, cache }
  }

  /// Comprehensive activity for a user and date range, cached for the activity TTL.
  pub async fn comprehensive_activity(
    &self,
    username: &str,
    start_date: &str,
    end_date: &str,
  ) -> Result<ComprehensiveUserActivity> {
    let key = ActivityKey::new(username, start_date, end_date);

    let result = self
      .cache
      .fetch_one(&key, || {
        self
          .inner
          .comprehensive_activity(username, start_date, end_date)
      })
      .await?;

    if result.is_cached() {
      info!(username, start_date, end_date, "Using cached GitHub activity");
    }

    Ok(result.data)
  }

  /// Pull request details with caching.
  pub async fn pull_request(&self, owner: &str, repo: &str, number: &str) -> Result<PullRequest> {
    let result = self
      .cache
      .fetch_one(&PullRequestKey::new(owner, repo, number), || {
        self.inner.pull_request(owner, repo, number)
      })
      .await?;

    Ok(result.data)
  }

  /// Issue details with caching.
  pub async fn issue(&self, owner: &str, repo: &str, number: &str) -> Result<Issue> {
    let result = self
      .cache
      .fetch_one(&IssueKey::new(owner, repo, number), || {
        self.inner.issue(owner, repo, number)
      })
      .await?;

    Ok(result.data)
  }
}
