//! Cache storage implementations.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};

use super::traits::{CacheEntry, CacheStorage};

/// Storage implementation that doesn't persist anything.
/// Used when the cache is memory-only - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn load(&self) -> Result<HashMap<String, CacheEntry>> {
    Ok(HashMap::new()) // Nothing stored
  }

  fn store(&self, _entries: &HashMap<String, CacheEntry>) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self) -> Result<()> {
    Ok(())
  }

  fn is_persistent(&self) -> bool {
    false
  }
}

/// JSON file storage: the whole map serialized as `{key: {data, expiry}}`.
pub struct JsonFileStorage {
  path: PathBuf,
}

impl JsonFileStorage {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn temp_path(&self) -> PathBuf {
    self.path.with_extension("json.tmp")
  }
}

impl CacheStorage for JsonFileStorage {
  fn load(&self) -> Result<HashMap<String, CacheEntry>> {
    let contents = match std::fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
      Err(e) => {
        return Err(eyre!(
          "Failed to read request cache {}: {}",
          self.path.display(),
          e
        ))
      }
    };

    serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse request cache {}: {}", self.path.display(), e))
  }

  fn store(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let data =
      serde_json::to_vec(entries).map_err(|e| eyre!("Failed to serialize request cache: {}", e))?;

    // Write aside and rename over, so a crash never leaves a truncated file
    let temp = self.temp_path();
    std::fs::write(&temp, data)
      .map_err(|e| eyre!("Failed to write request cache {}: {}", temp.display(), e))?;
    std::fs::rename(&temp, &self.path).map_err(|e| {
      eyre!(
        "Failed to replace request cache {}: {}",
        self.path.display(),
        e
      )
    })
  }

  fn remove(&self) -> Result<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!(
        "Failed to remove request cache {}: {}",
        self.path.display(),
        e
      )),
    }
  }

  fn is_persistent(&self) -> bool {
    true
  }
}
