//! perfdive: performance-review summaries built from Jira and GitHub activity.
//!
//! Upstream responses are kept in a multi-tier file cache (see [`cache`]) so
//! repeated runs over the same users and date ranges avoid the network.

pub mod cache;
pub mod cli;
pub mod config;
pub mod github;
pub mod jira;
pub mod logging;
