//! GitHub domain: activity, pull request and issue payloads and their cache front-end.

pub mod cache;
pub mod cached_client;
pub mod types;

pub use cache::{ActivityKey, IssueKey, PullRequestKey};
pub use cached_client::{CachedGithubClient, GithubSource};
