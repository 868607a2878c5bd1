use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::scheduler::{DEFAULT_INTERVAL, MAX_INTERVAL, MIN_INTERVAL};
use crate::sync::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub refresh: RefreshConfig,
  #[serde(default)]
  pub view: ViewConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub export: ExportConfig,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL; resources live at `{url}/{resource}`
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  10
}

impl BackendConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs.max(1))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
  DEFAULT_INTERVAL.as_secs()
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
    }
  }
}

impl RefreshConfig {
  /// Polling interval, clamped to the supported range.
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs).clamp(MIN_INTERVAL, MAX_INTERVAL)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  #[serde(default)]
  pub default_screen: ScreenKind,
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

impl Default for ViewConfig {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
      default_screen: ScreenKind::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false the fallback store keeps nothing
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database location (defaults to $XDG_DATA_HOME/adminsync/cache.db)
  pub path: Option<PathBuf>,
}

fn default_true() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
  #[serde(default = "default_export_dir")]
  pub dir: PathBuf,
}

fn default_export_dir() -> PathBuf {
  PathBuf::from(".")
}

impl Default for ExportConfig {
  fn default() -> Self {
    Self {
      dir: default_export_dir(),
    }
  }
}

/// The list screens, one per resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScreenKind {
  #[default]
  Roles,
  Categories,
  Suppliers,
  Doctors,
  Attendance,
}

impl ScreenKind {
  pub const ALL: [ScreenKind; 5] = [
    ScreenKind::Roles,
    ScreenKind::Categories,
    ScreenKind::Suppliers,
    ScreenKind::Doctors,
    ScreenKind::Attendance,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      ScreenKind::Roles => "roles",
      ScreenKind::Categories => "categories",
      ScreenKind::Suppliers => "suppliers",
      ScreenKind::Doctors => "doctors",
      ScreenKind::Attendance => "attendance",
    }
  }
}

impl fmt::Display for ScreenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./adminsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/adminsync/config.yaml
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
        "No configuration file found. Create one at ~/.config/adminsync/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("adminsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("adminsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;

    url::Url::parse(&config.backend.url)
      .map_err(|e| eyre!("backend.url '{}' is not a valid URL: {}", config.backend.url, e))?;

    Ok(config)
  }

  /// Get the backend API token from the environment, if one is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("ADMINSYNC_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}
