//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use super::kind::EntryKind;

/// Business identity of a cached item.
///
/// The identity decides where the blob lives and is also stored inside the
/// blob, so a read can check that the file really belongs to the identity it
/// was looked up for.
pub trait CacheKey: Serialize + DeserializeOwned + PartialEq + Send + Sync {
  /// Kind of item this identity addresses.
  fn kind(&self) -> EntryKind;

  /// Deterministic file name (including extension) within the kind's directory.
  fn file_name(&self) -> String;

  /// Human-readable identity, recorded in the metadata index for diagnostics.
  fn description(&self) -> String;
}

/// Result from a cache-first fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  pub fn is_cached(&self) -> bool {
    self.source == CacheSource::Cache
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the upstream API
  Network,
  /// Unexpired data from the cache
  Cache,
}
