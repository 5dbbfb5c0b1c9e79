//! Core traits and types for the request cache.

use std::collections::HashMap;

use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// A cached response body and the instant (epoch ms) it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub data: String,
  pub expiry: i64,
}

impl CacheEntry {
  pub fn is_expired(&self, now_ms: i64) -> bool {
    now_ms >= self.expiry
  }
}

/// Trait for request identities that can be used as cache keys.
pub trait QueryKey {
  /// Stable, fixed-length key used for storage.
  fn cache_hash(&self) -> String;

  /// Human readable description for logs.
  fn description(&self) -> String;
}

/// Trait for cache storage backends.
///
/// Backends persist the whole entry map at once; the cache decides when.
pub trait CacheStorage: Send + Sync {
  /// Load every stored entry, expired ones included.
  fn load(&self) -> Result<HashMap<String, CacheEntry>>;

  /// Replace the stored map with `entries`.
  fn store(&self, entries: &HashMap<String, CacheEntry>) -> Result<()>;

  /// Remove the backing store. Missing data is not an error.
  fn remove(&self) -> Result<()>;

  /// Whether writes reach anything durable. The cache skips flush
  /// scheduling for backends that return false.
  fn is_persistent(&self) -> bool;
}
