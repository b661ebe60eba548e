//! File logging. The terminal belongs to the TUI, so nothing goes to stderr.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DEFAULT_FILTER: &str = "daybook=info";

/// Directory the daily log files rotate in
pub fn log_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|dir| dir.join("daybook").join("logs"))
    .ok_or_else(|| eyre!("Could not determine data directory"))
}

/// Filter from RUST_LOG, then the config's `log_level`, then the default
fn env_filter(config: &Config) -> EnvFilter {
  EnvFilter::try_from_default_env()
    .or_else(|_| match &config.log_level {
      Some(level) => EnvFilter::try_new(level),
      None => EnvFilter::try_new(DEFAULT_FILTER),
    })
    .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init(config: &Config) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)?;

  let appender = tracing_appender::rolling::daily(&dir, "daybook.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(config))
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}
