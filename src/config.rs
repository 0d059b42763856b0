use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `api.base_url`.
pub const BASE_URL_ENV: &str = "FLX_API_BASE_URL";

/// Public demo backend used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub query: QueryConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
  /// How long a fetched value is served without a network call
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  /// How long an unused cache entry is kept
  #[serde(default = "default_gc_time_secs")]
  pub gc_time_secs: u64,
}

fn default_stale_time_secs() -> u64 {
  60
}

fn default_gc_time_secs() -> u64 {
  300
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
      gc_time_secs: default_gc_time_secs(),
    }
  }
}

impl QueryConfig {
  pub fn stale_time(&self) -> Result<chrono::Duration> {
    seconds("query.stale_time_secs", self.stale_time_secs)
  }

  pub fn gc_time(&self) -> Result<chrono::Duration> {
    seconds("query.gc_time_secs", self.gc_time_secs)
  }

  fn validate(&self) -> Result<()> {
    self.stale_time()?;
    self.gc_time()?;
    Ok(())
  }
}

fn seconds(name: &str, secs: u64) -> Result<chrono::Duration> {
  i64::try_from(secs)
    .ok()
    .and_then(chrono::Duration::try_seconds)
    .ok_or_else(|| eyre!("{} is out of range: {}", name, secs))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  /// One JSON file per store in the data directory
  #[default]
  File,
  /// Key/value table in a SQLite database
  Sqlite,
  /// Nothing survives the process
  Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  #[serde(default)]
  pub backend: StorageBackend,
  /// Data directory (defaults to $XDG_DATA_HOME/flx)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is not set
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write logs to a daily file in the data directory instead of stderr
  #[serde(default)]
  pub file: bool,
}

fn default_log_level() -> String {
  "warn".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: false,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./flx.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/flx/config.yaml
  ///
  /// Without any file the built-in defaults are used. `FLX_API_BASE_URL`
  /// overrides the configured base URL in every case.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
      if !base_url.trim().is_empty() {
        config.api.base_url = base_url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("flx.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("flx").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    config.query.validate()?;
    Ok(config)
  }
}
