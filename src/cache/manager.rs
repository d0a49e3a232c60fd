//! Cache manager: the metadata index and entry store behind one lock.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use super::kind::{EntryKind, TtlPolicy};
use super::metadata::MetadataIndex;
use super::stats::{self, CacheStats, DetailedStats, DiskUsage};
use super::store::{EntryStore, ReadOutcome, StoredEntry};
use super::traits::CacheKey;

/// File name of the metadata document inside a manager's root.
pub const METADATA_FILE: &str = "metadata.json";

/// File-backed cache for the kinds listed in its [`TtlPolicy`].
///
/// Reads (`get`, `stats`) share the index lock; writes (`set`, `clear`,
/// `clean_expired`) take it exclusively, only for the in-memory mutation and
/// the metadata flush. Blob writes happen outside the lock; read-path purges
/// delete under it so they cannot remove a blob a concurrent `set` just wrote.
///
/// Every read failure resolves to a miss. Caching is an optimization, so a
/// caller that gets `None` simply goes upstream.
#[derive(Debug)]
pub struct CacheManager {
  store: EntryStore,
  policy: TtlPolicy,
  index: RwLock<MetadataIndex>,
  /// Paths with a `set` between its blob write and its index update
  pending: Mutex<HashMap<String, usize>>,
}

/// Marks a path as being written for as long as it lives.
struct PendingWrite<'a> {
  pending: &'a Mutex<HashMap<String, usize>>,
  relative: String,
}

impl<'a> PendingWrite<'a> {
  fn start(pending: &'a Mutex<HashMap<String, usize>>, relative: &str) -> Self {
    *pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(relative.to_string())
      .or_insert(0) += 1;
    Self {
      pending,
      relative: relative.to_string(),
    }
  }
}

impl Drop for PendingWrite<'_> {
  fn drop(&mut self) {
    let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(count) = pending.get_mut(&self.relative) {
      *count -= 1;
      if *count == 0 {
        pending.remove(&self.relative);
      }
    }
  }
}

impl CacheManager {
  /// Open (or create) a cache rooted at `root`.
  pub fn open(root: impl Into<PathBuf>, policy: TtlPolicy) -> Result<Self> {
    let root = root.into();

    std::fs::create_dir_all(&root)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", root.display(), e))?;
    for subdir in policy.kinds().filter_map(|kind| kind.subdir()) {
      let dir = root.join(subdir);
      std::fs::create_dir_all(&dir)
        .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;
    }

    let mut index = MetadataIndex::load(root.join(METADATA_FILE));
    let dropped = index.resolve_kinds(|kind| policy.resolve(kind));
    if dropped > 0 {
      debug!(dropped, root = %root.display(), "Ignoring metadata entries of unmanaged kinds");
    }

    Ok(Self {
      store: EntryStore::new(root),
      policy,
      index: RwLock::new(index),
      pending: Mutex::new(HashMap::new()),
    })
  }

  pub fn root(&self) -> &Path {
    self.store.root()
  }

  pub fn policy(&self) -> &TtlPolicy {
    &self.policy
  }

  // The index is a plain map that is consistent between statements, so a
  // panic in another holder does not invalidate it.
  fn read_index(&self) -> RwLockReadGuard<'_, MetadataIndex> {
    self.index.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_index(&self) -> RwLockWriteGuard<'_, MetadataIndex> {
    self.index.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Look up the payload cached for `identity`.
  pub fn get<K: CacheKey, P: DeserializeOwned>(&self, identity: &K) -> Option<P> {
    self.get_entry(identity).map(|entry| entry.payload)
  }

  /// Like [`get`](Self::get), but also returns the stored identity and creation time.
  pub fn get_entry<K: CacheKey, P: DeserializeOwned>(
    &self,
    identity: &K,
  ) -> Option<StoredEntry<K, P>> {
    let kind = identity.kind();
    let Some(ttl) = self.policy.ttl(kind) else {
      debug!(%kind, "Cache lookup for unmanaged kind");
      return None;
    };

    let relative = EntryStore::relative_path(identity);
    let now = Utc::now();
    let (indexed, expired) = {
      let index = self.read_index();
      (index.get(&relative).cloned(), index.is_expired(&relative, now))
    };

    let indexed = match indexed {
      Some(entry) if !expired => entry,
      Some(entry) => {
        debug!(path = %relative, key = %entry.key, "Cache entry expired");
        self.purge(&relative, Some(entry.created));
        return None;
      }
      None => {
        // Not indexed: any blob at this path is unaccounted for.
        debug!(path = %relative, "Cache miss");
        self.purge(&relative, None);
        return None;
      }
    };

    match self.store.read::<K, P>(&relative, ttl, now) {
      ReadOutcome::Hit(entry) => {
        if entry.identity != *identity {
          debug!(
            path = %relative,
            key = %identity.description(),
            "Cached entry belongs to a different identity"
          );
          return None;
        }
        debug!(path = %relative, "Cache hit");
        Some(entry)
      }
      ReadOutcome::Missing => {
        debug!(path = %relative, "Indexed cache entry has no blob");
        self.purge(&relative, Some(indexed.created));
        None
      }
      ReadOutcome::Unreadable => None,
      ReadOutcome::Corrupt | ReadOutcome::Stale => {
        debug!(path = %relative, "Discarding unusable cache entry");
        self.purge(&relative, Some(indexed.created));
        None
      }
    }
  }

  /// Delete the blob and index entry at `relative`, as seen by a read.
  ///
  /// `seen_created` is the index entry the read saw (`None`: not indexed).
  /// Nothing happens if a `set` has replaced that entry since, and a blob
  /// whose `set` is still in flight is left for it to index.
  fn purge(&self, relative: &str, seen_created: Option<DateTime<Utc>>) {
    let mut index = self.write_index();
    let current = index.get(relative).map(|entry| entry.created);
    if current != seen_created {
      return;
    }

    let in_flight = self
      .pending
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(relative);
    if !in_flight {
      let _ = self.store.delete(relative);
    }

    if current.is_some() {
      index.remove(relative);
      if let Err(e) = index.save() {
        warn!(error = %e, "Failed to save cache metadata");
      }
    }
  }

  /// Store `payload` for `identity`, replacing any previous entry.
  ///
  /// Errors are advisory: the caller already holds the payload and can carry on.
  pub fn set<K: CacheKey, P: Serialize>(&self, identity: &K, payload: &P) -> Result<()> {
    let kind = identity.kind();
    let ttl = self
      .policy
      .ttl(kind)
      .ok_or_else(|| eyre!("Cache at {} does not store '{}' entries", self.root().display(), kind))?;

    let _pending = PendingWrite::start(&self.pending, &EntryStore::relative_path(identity));
    let now = Utc::now();
    let relative = self.store.write(identity, payload, now)?;

    let mut index = self.write_index();
    index.put(&relative, kind, &identity.description(), ttl, now);
    index.save()
  }

  /// Delete every blob and reset the index. Returns how many blob files were removed.
  pub fn clear(&self) -> Result<usize> {
    let mut removed = 0;
    let mut first_error = None;

    for kind in self.policy.kinds() {
      match self.store.clear_dir(kind.subdir(), &[METADATA_FILE]) {
        Ok(count) => removed += count,
        Err(e) => {
          warn!(%kind, error = %e, "Failed to clear cache directory");
          first_error.get_or_insert(e);
        }
      }
    }

    {
      let mut index = self.write_index();
      index.clear();
      index.save()?;
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(removed),
    }
  }

  /// Delete the blobs and index entries of a single kind.
  pub fn clear_kind(&self, kind: EntryKind) -> Result<usize> {
    if !self.policy.contains(kind) {
      return Err(eyre!(
        "Cache at {} does not store '{}' entries",
        self.root().display(),
        kind
      ));
    }

    let removed = self.store.clear_dir(kind.subdir(), &[METADATA_FILE])?;

    let mut index = self.write_index();
    index.remove_kind(kind);
    index.save()?;

    Ok(removed)
  }

  /// Remove every expired entry. Returns how many index entries were removed.
  pub fn clean_expired(&self) -> Result<usize> {
    let expired = {
      let mut index = self.write_index();
      let expired = index.sweep(Utc::now());
      if !expired.is_empty() {
        index.save()?;
      }
      expired
    };

    for relative in &expired {
      if let Err(e) = self.store.delete(relative) {
        warn!(path = %relative, error = %e, "Failed to delete expired cache entry");
      }
    }

    debug!(removed = expired.len(), root = %self.root().display(), "Cleaned expired cache entries");
    Ok(expired.len())
  }

  /// Entry counts per managed kind.
  pub fn stats(&self) -> CacheStats {
    let index = self.read_index();

    let mut stats = CacheStats {
      by_kind: self.policy.kinds().map(|kind| (kind, 0)).collect(),
      total: index.len(),
    };
    for (_, entry) in index.entries() {
      *stats.by_kind.entry(entry.kind).or_insert(0) += 1;
    }

    stats
  }

  /// Oldest and newest entries, and how many are past expiry.
  pub fn detailed_stats(&self) -> DetailedStats {
    let index = self.read_index();
    let now = Utc::now();

    DetailedStats {
      oldest_entry: index.entries().map(|(_, entry)| entry.created).min(),
      newest_entry: index.entries().map(|(_, entry)| entry.created).max(),
      expired_count: index
        .entries()
        .filter(|(_, entry)| entry.is_expired(now))
        .count(),
    }
  }

  /// Files and bytes owned by this manager: the files directly in its root
  /// plus the subdirectories of its kinds. Another cache nested under the
  /// same root is not counted.
  pub fn disk_usage(&self) -> Result<DiskUsage> {
    let mut usage = stats::top_level_usage(self.root())?;
    for subdir in self.policy.kinds().filter_map(|kind| kind.subdir()) {
      let dir = self.root().join(subdir);
      if dir.is_dir() {
        usage += stats::disk_usage(&dir)?;
      }
    }
    Ok(usage)
  }
}
