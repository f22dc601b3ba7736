use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{Cookie, HttpSettings};
use crate::cache::CacheSettings;

const COOKIES_ENV: &str = "FEEDWIRE_COOKIES";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub http: HttpConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  /// User-Agent header (defaults to `feedwire/<version>`)
  pub user_agent: Option<String>,
  pub timeout_secs: u64,
  /// Value of the `X-Requested-With` header on raw-text GETs
  pub requested_with: String,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      user_agent: None,
      timeout_secs: 30,
      requested_with: "XMLHttpRequest".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false every GET goes to the network
  pub enabled: bool,
  pub sweep_interval_secs: u64,
  pub idle_timeout_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      sweep_interval_secs: 120,
      idle_timeout_secs: 120,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive; `RUST_LOG` takes precedence
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./feedwire.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/feedwire/config.yaml
  ///
  /// Falls back to defaults when no file is found.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("feedwire.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("feedwire").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.sweep_interval_secs == 0 {
      return Err(eyre!("cache.sweep_interval_secs must be greater than zero"));
    }
    if self.http.timeout_secs == 0 {
      return Err(eyre!("http.timeout_secs must be greater than zero"));
    }
    Ok(())
  }

  pub fn cache_settings(&self) -> CacheSettings {
    CacheSettings {
      sweep_interval: Duration::from_secs(self.cache.sweep_interval_secs),
      idle_timeout: Duration::from_secs(self.cache.idle_timeout_secs),
    }
  }

  pub fn http_settings(&self) -> HttpSettings {
    let defaults = HttpSettings::default();
    HttpSettings {
      user_agent: self.http.user_agent.clone().unwrap_or(defaults.user_agent),
      timeout: Duration::from_secs(self.http.timeout_secs),
    }
  }

  /// Get request cookies from the environment.
  ///
  /// Reads FEEDWIRE_COOKIES as `name=value; name2=value2`. Unset means no cookies.
  pub fn get_cookies() -> Vec<Cookie> {
    std::env::var(COOKIES_ENV)
      .map(|header| Cookie::parse_list(&header))
      .unwrap_or_default()
  }
}
