//! Log setup. The terminal belongs to the UI, so logs go to a file.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_ENV: &str = "ADMINSYNC_LOG";
const DEFAULT_LEVEL: &str = "info";

/// Dependencies that are chatty at debug level.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "rusqlite"];

pub fn default_log_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|dir| dir.join("adminsync").join("logs"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}

fn build_env_filter(directives: &str) -> Result<EnvFilter> {
  let mut filter = EnvFilter::try_new(directives)
    .map_err(|e| eyre!("Invalid {} directives '{}': {}", LOG_ENV, directives, e))?;

  for target in QUIET_TARGETS {
    let directive = format!("{}=warn", target)
      .parse()
      .map_err(|e| eyre!("Invalid log directive for {}: {}", target, e))?;
    filter = filter.add_directive(directive);
  }
  Ok(filter)
}

/// Install the global subscriber writing to a daily rolling file in `dir`.
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// for the life of the program.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
  let filter = build_env_filter(&directives)?;

  let appender = tracing_appender::rolling::daily(dir, "adminsync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  tracing::info!(dir = %dir.display(), "logging initialized");
  Ok(guard)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_env_filter_accepts_directives() {
    assert!(build_env_filter("debug,adminsync::sync=trace").is_ok());
    assert!(build_env_filter("info").is_ok());
  }

  #[test]
  fn test_env_filter_rejects_garbage() {
    assert!(build_env_filter("adminsync=loud").is_err());
  }
}
