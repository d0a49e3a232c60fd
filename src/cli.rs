//! `perfdive cache` maintenance commands.
//!
//! Each command works on the GitHub and Jira caches independently: a domain
//! that fails to open or to apply the command is reported and the other one
//! still runs.

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;

use crate::cache::{disk_usage, CacheManager, EntryKind};
use crate::config::CacheConfig;
use crate::{github, jira};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
  /// Display cache statistics
  Stats,
  /// Clear all cached data
  Clear {
    /// Only clear entries of this kind (activity, pr, issue, jira-issue)
    #[arg(long, value_parser = parse_kind)]
    kind: Option<EntryKind>,
  },
  /// Remove expired cache entries
  Clean,
}

fn parse_kind(s: &str) -> Result<EntryKind, String> {
  s.parse::<EntryKind>().map_err(|e| e.to_string())
}

/// One domain's cache, or the reason it could not be opened.
struct Domain {
  name: &'static str,
  kinds: Vec<EntryKind>,
  cache: Result<CacheManager>,
}

fn open_domains(config: &CacheConfig) -> Vec<Domain> {
  vec![
    Domain {
      name: "GitHub",
      kinds: config.ttl.github_policy().kinds().collect(),
      cache: github::cache::open_cache(config),
    },
    Domain {
      name: "Jira",
      kinds: config.ttl.jira_policy().kinds().collect(),
      cache: jira::cache::open_cache(config),
    },
  ]
}

/// Run a cache command, writing its report to `out`.
///
/// Per-domain failures are part of the report; only a failure to write the
/// report itself is returned as an error.
pub fn run(command: &CacheCommand, config: &CacheConfig, out: &mut impl Write) -> Result<()> {
  let domains = open_domains(config);

  let written = match command {
    CacheCommand::Stats => stats(&domains, config, out),
    CacheCommand::Clear { kind } => clear(&domains, *kind, out),
    CacheCommand::Clean => clean(&domains, out),
  };

  written.map_err(|e| eyre!("Failed to write output: {}", e))
}

fn stats(domains: &[Domain], config: &CacheConfig, out: &mut impl Write) -> std::io::Result<()> {
  writeln!(out, "Cache Statistics")?;
  writeln!(out, "================")?;
  writeln!(out)?;

  let now = Utc::now();

  for domain in domains {
    let title = format!("{} Cache:", domain.name);
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "-".repeat(title.len()))?;

    match &domain.cache {
      Err(e) => writeln!(out, "  Error loading {} cache: {}", domain.name, e)?,
      Ok(cache) => {
        let counts = cache.stats();
        writeln!(out, "  {:<21}{}", "Total entries:", counts.total)?;
        for kind in cache.policy().kinds() {
          let ttl = cache.policy().ttl(kind).unwrap_or_else(|| kind.default_ttl());
          writeln!(
            out,
            "  {:<21}{} (TTL: {})",
            format!("{} entries:", kind_label(kind)),
            counts.count(kind),
            format_ttl(ttl)
          )?;
        }

        let detailed = cache.detailed_stats();
        writeln!(out, "  {:<21}{}", "Oldest entry:", format_time_ago(detailed.oldest_entry, now))?;
        writeln!(out, "  {:<21}{}", "Newest entry:", format_time_ago(detailed.newest_entry, now))?;
        writeln!(out, "  {:<21}{}", "Expired entries:", detailed.expired_count)?;
      }
    }
    writeln!(out)?;
  }

  match config.root() {
    Err(e) => writeln!(out, "Cache directory: unknown ({})", e)?,
    Ok(root) => match disk_usage(&root) {
      Err(e) => writeln!(out, "Cache directory: {} (error reading: {})", root.display(), e)?,
      Ok(usage) => {
        writeln!(out, "Cache Directory: {}", root.display())?;
        writeln!(out, "  {:<21}{}", "Total files:", usage.files)?;
        writeln!(out, "  {:<21}{}", "Total size:", format_bytes(usage.bytes))?;
      }
    },
  }

  Ok(())
}

fn clear(domains: &[Domain], kind: Option<EntryKind>, out: &mut impl Write) -> std::io::Result<()> {
  match kind {
    Some(kind) => writeln!(out, "Clearing cached {} entries...", kind)?,
    None => writeln!(out, "Clearing all cache...")?,
  }
  writeln!(out)?;

  for domain in domains {
    if kind.is_some_and(|kind| !domain.kinds.contains(&kind)) {
      continue;
    }

    let cache = match &domain.cache {
      Ok(cache) => cache,
      Err(e) => {
        writeln!(out, "Clearing {} cache... failed: {}", domain.name, e)?;
        continue;
      }
    };

    let result = match kind {
      Some(kind) => cache.clear_kind(kind),
      None => cache.clear(),
    };

    match result {
      Ok(removed) => writeln!(
        out,
        "Clearing {} cache... done ({} removed)",
        domain.name,
        plural(removed as i64, "file")
      )?,
      Err(e) => writeln!(out, "Clearing {} cache... failed: {}", domain.name, e)?,
    }
  }

  writeln!(out)?;
  writeln!(out, "Cache cleared.")
}

fn clean(domains: &[Domain], out: &mut impl Write) -> std::io::Result<()> {
  writeln!(out, "Cleaning expired cache entries...")?;
  writeln!(out)?;

  let mut total = 0;
  for domain in domains {
    let result = match &domain.cache {
      Ok(cache) => cache.clean_expired(),
      Err(e) => Err(eyre!("{}", e)),
    };

    match result {
      Ok(removed) => {
        total += removed;
        writeln!(out, "Cleaning {} cache... removed {} expired entries", domain.name, removed)?;
      }
      Err(e) => writeln!(out, "Cleaning {} cache... failed: {}", domain.name, e)?,
    }
  }

  writeln!(out)?;
  writeln!(out, "Cleaned {} expired entries total.", total)
}

fn kind_label(kind: EntryKind) -> &'static str {
  match kind {
    EntryKind::Activity => "Activity",
    EntryKind::PullRequest => "PR",
    EntryKind::Issue => "Issue",
    EntryKind::JiraIssue => "Jira issue",
  }
}

fn plural(count: i64, unit: &str) -> String {
  if count == 1 {
    format!("1 {}", unit)
  } else {
    format!("{} {}s", count, unit)
  }
}

/// "1 hour", "24 hours", "90 minutes", "30 seconds".
pub fn format_ttl(ttl: Duration) -> String {
  if ttl.num_seconds() % 3600 == 0 && ttl.num_hours() > 0 {
    plural(ttl.num_hours(), "hour")
  } else if ttl.num_seconds() % 60 == 0 && ttl.num_minutes() > 0 {
    plural(ttl.num_minutes(), "minute")
  } else {
    plural(ttl.num_seconds(), "second")
  }
}

/// How long before `now` a timestamp was, e.g. "5 minutes ago". `None` is "N/A".
pub fn format_time_ago(time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
  let Some(time) = time else {
    return "N/A".to_string();
  };

  let elapsed = now - time;
  if elapsed < Duration::minutes(1) {
    "just now".to_string()
  } else if elapsed < Duration::hours(1) {
    format!("{} ago", plural(elapsed.num_minutes(), "minute"))
  } else if elapsed < Duration::days(1) {
    format!("{} ago", plural(elapsed.num_hours(), "hour"))
  } else {
    format!("{} ago", plural(elapsed.num_days(), "day"))
  }
}

/// Human-readable size with binary units, e.g. "1.5 KB".
pub fn format_bytes(bytes: u64) -> String {
  const UNIT: u64 = 1024;
  const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

  if bytes < UNIT {
    return format!("{} B", bytes);
  }

  let mut div = UNIT;
  let mut exp = 0;
  let mut n = bytes / UNIT;
  while n >= UNIT && exp < PREFIXES.len() - 1 {
    div *= UNIT;
    exp += 1;
    n /= UNIT;
  }

  format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
