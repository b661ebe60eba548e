use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::api::GoalFilter;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Filter the goal list opens with
  #[serde(default)]
  pub default_filter: GoalFilter,
  /// Log filter directive used when RUST_LOG is unset (e.g. "daybook=debug")
  pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the backend, e.g. https://example.com/api/v1
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// Cache lives for the process only
  #[default]
  Memory,
  /// Cache is persisted to SQLite and reused on the next start
  Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub backend: CacheBackend,
  /// Seconds before a cached query is refetched
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
}

fn default_stale_secs() -> u64 {
  300
}

impl CacheConfig {
  /// `stale_secs` as a duration, or an error if it does not fit one
  pub fn stale_time(&self) -> Result<chrono::TimeDelta> {
    i64::try_from(self.stale_secs)
      .ok()
      .and_then(chrono::TimeDelta::try_seconds)
      .ok_or_else(|| eyre!("cache.stale_secs is out of range: {}", self.stale_secs))
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: CacheBackend::default(),
      stale_secs: default_stale_secs(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./daybook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/daybook/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/daybook/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("daybook.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("daybook").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if url::Url::parse(&config.api.url).is_err() {
      return Err(eyre!("api.url is not a valid URL: {}", config.api.url));
    }
    config.cache.stale_time()?;

    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks DAYBOOK_API_TOKEN first, then DAYBOOK_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("DAYBOOK_API_TOKEN")
      .or_else(|_| std::env::var("DAYBOOK_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set DAYBOOK_API_TOKEN or DAYBOOK_TOKEN environment variable.")
      })
  }
}
