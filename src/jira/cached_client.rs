//! Cached Jira client that wraps an upstream issue source with transparent caching.

use color_eyre::Result;
use std::future::Future;

use crate::cache::CacheLayer;

use super::cache::{cached_issues, store_issues, JiraIssueKey};
use super::types::Issue;

/// Upstream provider of Jira issues (normally the Jira REST client).
pub trait JiraSource: Send + Sync {
  /// Fetch one issue with its comments, history and time tracking.
  fn get_issue(&self, key: &str) -> impl Future<Output = Result<Issue>> + Send;
}

/// Jira client with transparent caching support.
///
/// This wraps the upstream source and provides the same API, skipping the
/// upstream call whenever an unexpired copy is cached.
#[derive(Clone)]
pub struct CachedJiraClient<S> {
  inner: S,
  cache: CacheLayer,
}

impl<S: JiraSource> CachedJiraClient<S> {
  pub fn new(inner: S, cache: CacheLayer) -> Self {
    Self { inner, cache }
  }

  /// Get a single issue by key with caching.
  pub async fn get_issue(&self, key: &str) -> Result<Issue> {
    let result = self
      .cache
      .fetch_one(&JiraIssueKey::new(key), || self.inner.get_issue(key))
      .await?;

    Ok(result.data)
  }

  /// Get several issues, fetching only the ones not already cached.
  ///
  /// Issues come back in the order of `keys`.
  pub async fn get_issues(&self, keys: &[String]) -> Result<Vec<Issue>> {
    let Some(cache) = self.cache.manager() else {
      return futures::future::try_join_all(keys.iter().map(|key| self.inner.get_issue(key))).await;
    };

    let (mut found, missing) = cached_issues(cache, keys);

    let fetched =
      futures::future::try_join_all(missing.iter().map(|key| self.inner.get_issue(key))).await?;
    store_issues(cache, &fetched);
    for (key, issue) in missing.into_iter().zip(fetched) {
      found.insert(key, issue);
    }

    Ok(keys.iter().filter_map(|key| found.get(key).cloned()).collect())
  }
}
