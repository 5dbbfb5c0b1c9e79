use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub github: GitHubConfig,
  #[serde(default)]
  pub inbox: InboxConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Where snapshots, the request cache and logs live
  /// (defaults to $XDG_DATA_HOME/hubox)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
  /// REST API root, override for GitHub Enterprise
  pub api_url: String,
  /// Page size for notification listing
  pub per_page: u32,
  /// Transport timeout for a single request
  pub timeout_secs: u64,
}

impl Default for GitHubConfig {
  fn default() -> Self {
    Self {
      api_url: "https://api.github.com".to_string(),
      per_page: 50,
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
  /// Working set size on first run and after a reset
  pub max_active: usize,
  /// How much `expand` grows the working set when no amount is given
  pub expand_step: usize,
  /// Only issues are eligible for the working set
  pub issues_only: bool,
}

impl Default for InboxConfig {
  fn default() -> Self {
    Self {
      max_active: 10,
      expand_step: 10,
      issues_only: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub ttl_secs: u64,
  /// Keep cached responses across runs
  pub persist: bool,
  /// Coalescing window for cache writes
  pub flush_debounce_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: 300,
      persist: true,
      flush_debounce_ms: 1000,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }

  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.flush_debounce_ms)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hubox.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hubox/config.yaml
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
    let local = PathBuf::from("hubox.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hubox").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.inbox.max_active == 0 {
      return Err(eyre!("inbox.max_active must be at least 1"));
    }
    if config.github.per_page == 0 {
      return Err(eyre!("github.per_page must be at least 1"));
    }

    Ok(config)
  }

  /// Resolve the data directory.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("hubox"))
  }

  /// Get the GitHub token from environment variables.
  ///
  /// Checks HUBOX_GITHUB_TOKEN first, then GITHUB_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("HUBOX_GITHUB_TOKEN")
      .or_else(|_| std::env::var("GITHUB_TOKEN"))
      .map_err(|_| {
        eyre!("GitHub token not found. Set HUBOX_GITHUB_TOKEN or GITHUB_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_document_uses_defaults() {
    let config = Config::parse("{}").unwrap();

    assert_eq!(config.github.api_url, "https://api.github.com");
    assert_eq!(config.inbox.max_active, 10);
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl(), Duration::from_secs(300));
  }

  #[test]
  fn test_partial_sections_keep_other_defaults() {
    let config = Config::parse(
      "inbox:\n  max_active: 3\n  issues_only: true\ncache:\n  persist: false\n",
    )
    .unwrap();

    assert_eq!(config.inbox.max_active, 3);
    assert!(config.inbox.issues_only);
    assert_eq!(config.inbox.expand_step, 10);
    assert!(!config.cache.persist);
    assert_eq!(config.cache.debounce(), Duration::from_millis(1000));
  }

  #[test]
  fn test_zero_inbox_is_rejected() {
    assert!(Config::parse("inbox:\n  max_active: 0\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("nope.yaml"))).is_err());
  }

  #[test]
  fn test_explicit_data_dir_wins() {
    let config = Config::parse("data_dir: /tmp/hubox-test\n").unwrap();
    assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/hubox-test"));
  }
}
