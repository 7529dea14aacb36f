use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub codeforces: CodeforcesConfig,
  pub sync: SyncConfig,
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodeforcesConfig {
  pub base_url: String,
  /// Pause before every uncached request, in milliseconds
  pub request_delay_ms: u64,
  pub cache_ttl_minutes: i64,
  pub timeout_secs: u64,
}

impl Default for CodeforcesConfig {
  fn default() -> Self {
    Self {
      base_url: "https://codeforces.com/api".to_string(),
      request_delay_ms: 1200,
      cache_ttl_minutes: 180,
      timeout_secs: 30,
    }
  }
}

impl CodeforcesConfig {
  pub fn request_delay(&self) -> Duration {
    Duration::from_millis(self.request_delay_ms)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn cache_ttl(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.cache_ttl_minutes)
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
  /// Recent submissions inspected when syncing a student
  pub submission_window: usize,
  pub inactivity_threshold_days: i64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      submission_window: 50,
      inactivity_threshold_days: 7,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
  /// Database file (defaults to the platform data directory)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cftrack.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cftrack/config.yaml
  ///
  /// Without a config file every setting takes its default.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("cftrack.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cftrack").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-default config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  fn validate(&self) -> Result<()> {
    if self.codeforces.cache_ttl_minutes <= 0 {
      return Err(eyre!("codeforces.cache_ttl_minutes must be positive"));
    }
    if self.sync.submission_window == 0 {
      return Err(eyre!("sync.submission_window must be at least 1"));
    }
    if self.sync.inactivity_threshold_days < 0 {
      return Err(eyre!("sync.inactivity_threshold_days must not be negative"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.codeforces.request_delay(), Duration::from_millis(1200));
    assert_eq!(config.codeforces.cache_ttl(), chrono::Duration::hours(3));
    assert_eq!(config.sync.submission_window, 50);
    assert_eq!(config.sync.inactivity_threshold_days, 7);
    assert_eq!(config.storage.path, None);
  }

  #[test]
  fn test_partial_override() {
    let config = Config::parse(
      "codeforces:\n  request_delay_ms: 0\nsync:\n  inactivity_threshold_days: 14\n",
    )
    .unwrap();

    assert_eq!(config.codeforces.request_delay_ms, 0);
    assert_eq!(config.codeforces.base_url, "https://codeforces.com/api");
    assert_eq!(config.sync.inactivity_threshold_days, 14);
    assert_eq!(config.sync.submission_window, 50);
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "storage:\n  path: /tmp/roster.db").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/roster.db")));
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/cftrack.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_invalid_values_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "codeforces:\n  cache_ttl_minutes: 0").unwrap();

    assert!(Config::load(Some(file.path())).is_err());
  }
}
