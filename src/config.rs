use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the opinions API, e.g. "http://localhost:8000"
  pub base_url: String,
  /// Fixed request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  10
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Portal origin the worker serves, e.g. "http://localhost:5173"
  #[serde(default = "default_origin")]
  pub origin: String,
  /// Path prefix identifying API requests (network-first policy)
  #[serde(default = "default_api_prefix")]
  pub api_prefix: String,
  /// Worker cache version; bumping it invalidates the precache generation
  #[serde(default = "default_cache_version")]
  pub version: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      api_prefix: default_api_prefix(),
      version: default_cache_version(),
    }
  }
}

fn default_origin() -> String {
  "http://localhost:5173".to_string()
}

fn default_api_prefix() -> String {
  "/api/".to_string()
}

fn default_cache_version() -> u32 {
  1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
  /// Background poll interval in seconds
  #[serde(default = "default_poll_secs")]
  pub poll_secs: u64,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      poll_secs: default_poll_secs(),
    }
  }
}

fn default_poll_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./agora.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/agora/config.yaml
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
        "No configuration file found. Create one at ~/.config/agora/config.yaml\n\
                 At minimum it needs an api.base_url entry."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("agora.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("agora").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }
}
