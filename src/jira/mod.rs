//! Jira domain: issue payloads and their cache front-end.

pub mod cache;
pub mod cached_client;
pub mod types;

pub use cache::JiraIssueKey;
pub use cached_client::{CachedJiraClient, JiraSource};
pub use types::Issue;
