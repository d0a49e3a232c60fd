//! File-backed response cache for upstream API results.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Stores one JSON blob per item, keyed deterministically from its identity
//! - Tracks expiration in a metadata index mirrored to `metadata.json`
//! - Applies a per-kind TTL table (see [`TtlPolicy`])
//! - Degrades every failure on the read path to a cache miss
//!
//! The GitHub and Jira front-ends each open their own [`CacheManager`] over a
//! separate root, so the two domains keep independent metadata documents.

mod kind;
mod layer;
mod manager;
mod metadata;
mod stats;
mod store;
mod traits;

pub use kind::{EntryKind, TtlPolicy};
pub use layer::CacheLayer;
pub use manager::{CacheManager, METADATA_FILE};
pub use metadata::{MetadataEntry, MetadataIndex};
pub use stats::{disk_usage, top_level_usage, CacheStats, DetailedStats, DiskUsage};
pub use store::{EntryStore, ReadOutcome, StoredEntry};
pub use traits::{CacheKey, CacheResult, CacheSource};
