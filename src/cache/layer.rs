//! Cache layer that orchestrates caching logic with network fetching.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use super::kind::TtlPolicy;
use super::manager::CacheManager;
use super::traits::{CacheKey, CacheResult};

/// Cache-first fetching in front of an upstream client.
///
/// A layer without a manager behaves as if caching were disabled: every fetch
/// goes upstream. This is what callers get when the cache cannot be opened.
#[derive(Clone, Default)]
pub struct CacheLayer {
  cache: Option<Arc<CacheManager>>,
}

impl CacheLayer {
  /// Create a new cache layer over the given manager.
  pub fn new(cache: CacheManager) -> Self {
    Self::shared(Arc::new(cache))
  }

  /// Create a layer over a manager that other layers may also use.
  pub fn shared(cache: Arc<CacheManager>) -> Self {
    Self { cache: Some(cache) }
  }

  /// A layer that never caches.
  pub fn disabled() -> Self {
    Self { cache: None }
  }

  /// Open a manager at `root`, falling back to a disabled layer if that fails.
  pub fn open_or_disabled(root: impl Into<PathBuf>, policy: TtlPolicy) -> Self {
    let root = root.into();
    match CacheManager::open(&root, policy) {
      Ok(cache) => Self::new(cache),
      Err(e) => {
        warn!(root = %root.display(), error = %e, "Cache unavailable, continuing without it");
        Self::disabled()
      }
    }
  }

  pub fn manager(&self) -> Option<&CacheManager> {
    self.cache.as_deref()
  }

  pub fn is_enabled(&self) -> bool {
    self.cache.is_some()
  }

  /// Fetch a single item with caching.
  ///
  /// 1. Check cache - if present and unexpired, return it without calling `fetcher`
  /// 2. Otherwise fetch from network
  /// 3. Store the result; a failed store is logged, never returned
  pub async fn fetch_one<K, P, F, Fut>(&self, identity: &K, fetcher: F) -> Result<CacheResult<P>>
  where
    K: CacheKey,
    P: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<P>>,
  {
    if let Some(cache) = &self.cache {
      if let Some(entry) = cache.get_entry::<K, P>(identity) {
        return Ok(CacheResult::from_cache(entry.payload, entry.created_at));
      }
    }

    let data = fetcher().await?;

    if let Some(cache) = &self.cache {
      if let Err(e) = cache.set(identity, &data) {
        warn!(key = %identity.description(), error = %e, "Failed to cache fetched data");
      }
    }

    Ok(CacheResult::from_network(data))
  }
}
