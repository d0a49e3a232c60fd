//! Entry store: one JSON blob per cached item.
//!
//! A blob carries the payload, its creation time and the identity fields it
//! was fetched for, flattened next to each other:
//!
//! ```json
//! { "data": { ... }, "timestamp": "2025-01-01T00:00:00Z", "owner": "k8s", "repo": "k8s", "number": "100" }
//! ```

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::CacheKey;

#[derive(Serialize)]
struct BlobRef<'a, K, P> {
  data: &'a P,
  timestamp: DateTime<Utc>,
  #[serde(flatten)]
  identity: &'a K,
}

#[derive(Deserialize)]
struct Blob<K, P> {
  data: P,
  timestamp: DateTime<Utc>,
  #[serde(flatten)]
  identity: K,
}

/// A blob read back from disk.
#[derive(Debug, Clone)]
pub struct StoredEntry<K, P> {
  pub payload: P,
  pub identity: K,
  pub created_at: DateTime<Utc>,
}

/// Outcome of reading a blob. Only `Hit` carries data; every other variant is a miss.
#[derive(Debug)]
pub enum ReadOutcome<K, P> {
  Hit(StoredEntry<K, P>),
  /// No file at the path
  Missing,
  /// File exists but could not be read (permissions, transient I/O)
  Unreadable,
  /// File is not a valid blob for this payload type
  Corrupt,
  /// Embedded timestamp is older than the TTL allows
  Stale,
}

/// Reads and writes blobs below a root directory.
#[derive(Debug, Clone)]
pub struct EntryStore {
  root: PathBuf,
}

impl EntryStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Relative storage path for an identity, always `/`-separated.
  pub fn relative_path<K: CacheKey>(identity: &K) -> String {
    match identity.kind().subdir() {
      Some(subdir) => format!("{}/{}", subdir, identity.file_name()),
      None => identity.file_name(),
    }
  }

  pub fn absolute_path(&self, relative: &str) -> PathBuf {
    relative
      .split('/')
      .fold(self.root.clone(), |path, part| path.join(part))
  }

  /// Serialize `payload` with its identity and write it, returning the relative path.
  pub fn write<K: CacheKey, P: Serialize>(
    &self,
    identity: &K,
    payload: &P,
    created_at: DateTime<Utc>,
  ) -> Result<String> {
    let relative = Self::relative_path(identity);
    let blob = BlobRef {
      data: payload,
      timestamp: created_at,
      identity,
    };
    let data = serde_json::to_vec(&blob)
      .map_err(|e| eyre!("Failed to serialize cache entry {}: {}", relative, e))?;

    write_atomic(&self.absolute_path(&relative), &data)?;
    Ok(relative)
  }

  /// Read the blob at `relative`, rejecting it if older than `ttl` at `now`.
  pub fn read<K: CacheKey, P: DeserializeOwned>(
    &self,
    relative: &str,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> ReadOutcome<K, P> {
    let path = self.absolute_path(relative);

    let data = match std::fs::read(&path) {
      Ok(data) => data,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ReadOutcome::Missing,
      Err(e) => {
        debug!(path = %path.display(), error = %e, "Failed to read cache entry");
        return ReadOutcome::Unreadable;
      }
    };

    let blob: Blob<K, P> = match serde_json::from_slice(&data) {
      Ok(blob) => blob,
      Err(e) => {
        debug!(path = %path.display(), error = %e, "Cache entry is corrupted");
        return ReadOutcome::Corrupt;
      }
    };

    if now - blob.timestamp > ttl {
      return ReadOutcome::Stale;
    }

    ReadOutcome::Hit(StoredEntry {
      payload: blob.data,
      identity: blob.identity,
      created_at: blob.timestamp,
    })
  }

  /// Remove the blob at `relative`. Absent files are not an error.
  pub fn delete(&self, relative: &str) -> Result<()> {
    let path = self.absolute_path(relative);
    match std::fs::remove_file(&path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!("Failed to delete cache entry {}: {}", path.display(), e)),
    }
  }

  /// Delete every regular file directly inside `subdir` (or the root), except `keep`.
  ///
  /// A missing directory counts as already empty. Returns how many files were removed.
  pub fn clear_dir(&self, subdir: Option<&str>, keep: &[&str]) -> Result<usize> {
    let dir = match subdir {
      Some(subdir) => self.root.join(subdir),
      None => self.root.clone(),
    };

    let entries = match std::fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
      Err(e) => return Err(eyre!("Failed to list cache directory {}: {}", dir.display(), e)),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
      let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
      let name = entry.file_name();
      if !is_file || keep.iter().any(|k| name == *k) {
        continue;
      }
      match std::fs::remove_file(entry.path()) {
        Ok(()) => removed += 1,
        Err(e) => debug!(path = %entry.path().display(), error = %e, "Failed to delete cache file"),
      }
    }

    Ok(removed)
  }
}

/// Write `data` to `path` through a temp file in the same directory, then rename.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| eyre!("Cache path has no parent directory: {}", path.display()))?;

  std::fs::create_dir_all(parent)
    .map_err(|e| eyre!("Failed to create cache directory {}: {}", parent.display(), e))?;

  let mut tmp = tempfile::NamedTempFile::new_in(parent)
    .map_err(|e| eyre!("Failed to create temp file in {}: {}", parent.display(), e))?;
  tmp
    .write_all(data)
    .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
  tmp
    .persist(path)
    .map_err(|e| eyre!("Failed to replace {}: {}", path.display(), e.error))?;

  Ok(())
}
