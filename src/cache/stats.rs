//! Statistics reported by a cache manager.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use super::kind::EntryKind;

/// Entry counts per kind, taken from the metadata index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub by_kind: BTreeMap<EntryKind, usize>,
  pub total: usize,
}

impl CacheStats {
  pub fn count(&self, kind: EntryKind) -> usize {
    self.by_kind.get(&kind).copied().unwrap_or(0)
  }
}

/// Age profile of the entries in an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailedStats {
  pub oldest_entry: Option<DateTime<Utc>>,
  pub newest_entry: Option<DateTime<Utc>>,
  /// Entries past their expiry that no read or sweep has removed yet
  pub expired_count: usize,
}

/// Files and bytes under a cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
  pub files: usize,
  pub bytes: u64,
}

impl std::ops::AddAssign for DiskUsage {
  fn add_assign(&mut self, other: Self) {
    self.files += other.files;
    self.bytes += other.bytes;
  }
}

/// Walk `root` recursively and total up its regular files.
pub fn disk_usage(root: &Path) -> Result<DiskUsage> {
  usage_of(WalkDir::new(root), root)
}

/// Regular files directly inside `root`, ignoring subdirectories.
pub fn top_level_usage(root: &Path) -> Result<DiskUsage> {
  usage_of(WalkDir::new(root).max_depth(1), root)
}

fn usage_of(walker: WalkDir, root: &Path) -> Result<DiskUsage> {
  let mut usage = DiskUsage::default();

  for entry in walker {
    let entry = entry.map_err(|e| eyre!("Failed to read cache directory {}: {}", root.display(), e))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let metadata = entry
      .metadata()
      .map_err(|e| eyre!("Failed to stat {}: {}", entry.path().display(), e))?;
    usage.files += 1;
    usage.bytes += metadata.len();
  }

  Ok(usage)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_count_defaults_to_zero() {
    let stats = CacheStats::default();
    assert_eq!(stats.count(EntryKind::Activity), 0);
  }

  #[test]
  fn test_disk_usage_is_recursive() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("metadata.json"), b"12345").unwrap();
    std::fs::create_dir(dir.path().join("prs")).unwrap();
    std::fs::write(dir.path().join("prs").join("a_b_1.json"), b"123").unwrap();

    let usage = disk_usage(dir.path()).unwrap();
    assert_eq!(usage, DiskUsage { files: 2, bytes: 8 });
  }

  #[test]
  fn test_top_level_usage_skips_subdirectories() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("metadata.json"), b"12345").unwrap();
    std::fs::create_dir(dir.path().join("jira")).unwrap();
    std::fs::write(dir.path().join("jira").join("PROJ-1.json"), b"123").unwrap();

    let usage = top_level_usage(dir.path()).unwrap();
    assert_eq!(usage, DiskUsage { files: 1, bytes: 5 });
  }

  #[test]
  fn test_disk_usage_missing_root_fails() {
    let dir = TempDir::new().unwrap();
    assert!(disk_usage(&dir.path().join("missing")).is_err());
  }
}
