use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub source: SourceConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Listen address for the HTTP layer in front of the query service.
  pub listen: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// Base URL of the source API, e.g. "https://forge.example.org/api/v3/".
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Database file path. Unset means the platform data directory;
  /// ":memory:" keeps the whole mirror in memory.
  pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Seconds between reconciliation cycles.
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval_secs(),
    }
  }
}

// 3 hours, matching the source deployment's drain schedule.
fn default_interval_secs() -> u64 {
  10800
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./forge-mirror.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/forge-mirror/config.yaml
  /// 4. ~/.config/forge-mirror/config.yaml
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
        "No configuration file found. Create one at ~/.config/forge-mirror/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("forge-mirror.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("forge-mirror").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the source API token from the environment, if set. Public
  /// deployments can mirror without one.
  pub fn get_api_token() -> Option<String> {
    std::env::var("FORGE_MIRROR_TOKEN").ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_minimal_config_with_defaults() {
    let config: Config = serde_yaml::from_str("source:\n  url: https://forge.example.org/api/\n").unwrap();
    assert_eq!(config.source.url, "https://forge.example.org/api/");
    assert_eq!(config.sync.interval_secs, 10800);
    assert!(config.cache.path.is_none());
    assert!(config.listen.is_none());
  }

  #[test]
  fn parses_full_config() {
    let yaml = r#"
source:
  url: https://forge.example.org/api/
cache:
  path: /var/lib/forge-mirror/mirror.db
sync:
  interval_secs: 600
listen: 127.0.0.1:5000
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.sync.interval_secs, 600);
    assert_eq!(
      config.cache.path.as_deref(),
      Some("/var/lib/forge-mirror/mirror.db")
    );
    assert_eq!(config.listen.as_deref(), Some("127.0.0.1:5000"));
  }
}
