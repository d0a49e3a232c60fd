use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::debug;

use perfdive::cli::{self, CacheCommand};
use perfdive::config::Config;
use perfdive::logging;

#[derive(Parser, Debug)]
#[command(name = "perfdive")]
#[command(about = "Summarize Jira and GitHub activity for performance reviews")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./perfdive.yaml or $XDG_CONFIG_HOME/perfdive/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Enable debug logging (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Write logs to this file instead of stderr
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage the perfdive cache
  #[command(subcommand)]
  Cache(CacheCommand),
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Held until exit so buffered file logs are flushed
  let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  debug!(?config, "Loaded configuration");

  match &args.command {
    Command::Cache(command) => {
      let stdout = std::io::stdout();
      cli::run(command, &config.cache, &mut stdout.lock())?;
    }
  }

  Ok(())
}
