//! Request cache that sits between the GitHub client and the network.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use color_eyre::Result;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::storage::{JsonFileStorage, NoopStorage};
use super::traits::{CacheEntry, CacheStorage};

/// TTL-bounded cache of raw response bodies.
///
/// Writes to a persistent backend are debounced: every `set` inside the
/// coalescing window lands in a single write of the whole map. At most one
/// flush task is outstanding at a time. Pending writes are drained by
/// [`RequestCache::flush`], and by drop when the last handle goes away.
///
/// Cloning is cheap and all clones share the same entries.
#[derive(Clone)]
pub struct RequestCache {
  inner: Arc<Inner>,
}

struct Inner {
  entries: Mutex<HashMap<String, CacheEntry>>,
  storage: Box<dyn CacheStorage>,
  ttl: Duration,
  debounce: Duration,
  /// Set when entries changed since the last successful write
  dirty: AtomicBool,
  pending_flush: Mutex<Option<JoinHandle<()>>>,
  /// Serializes writes to the backend
  io: Mutex<()>,
}

impl RequestCache {
  /// Coalescing window used when none is configured.
  pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

  /// Create a cache over `storage`, loading whatever it holds.
  ///
  /// Entries that already expired are dropped before first use. A backend
  /// that fails to load is logged and the cache starts empty.
  pub fn new(storage: impl CacheStorage + 'static, ttl: Duration, debounce: Duration) -> Self {
    let entries = match storage.load() {
      Ok(mut entries) => {
        let now = now_ms();
        let loaded = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        debug!(
          kept = entries.len(),
          dropped = loaded - entries.len(),
          "Loaded request cache"
        );
        entries
      }
      Err(e) => {
        warn!("Starting with an empty request cache: {}", e);
        HashMap::new()
      }
    };

    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(entries),
        storage: Box::new(storage),
        ttl,
        debounce,
        dirty: AtomicBool::new(false),
        pending_flush: Mutex::new(None),
        io: Mutex::new(()),
      }),
    }
  }

  /// Memory-only cache, nothing is written anywhere.
  pub fn in_memory(ttl: Duration) -> Self {
    Self::new(NoopStorage, ttl, Self::DEFAULT_DEBOUNCE)
  }

  /// Cache persisted as JSON at `path`.
  pub fn persistent(path: impl Into<PathBuf>, ttl: Duration, debounce: Duration) -> Self {
    Self::new(JsonFileStorage::new(path), ttl, debounce)
  }

  /// Look up a live entry. Expired entries are evicted and reported absent.
  pub fn get(&self, key: &str) -> Option<String> {
    let mut entries = self.inner.lock_entries();

    match entries.get(key) {
      Some(entry) if !entry.is_expired(now_ms()) => Some(entry.data.clone()),
      Some(_) => {
        entries.remove(key);
        None
      }
      None => None,
    }
  }

  /// Store `value` under `key` until `now + ttl`.
  pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
    let ttl_ms = i64::try_from(self.inner.ttl.as_millis()).unwrap_or(i64::MAX);
    let entry = CacheEntry {
      data: value.into(),
      expiry: now_ms().saturating_add(ttl_ms),
    };
    self.inner.lock_entries().insert(key.into(), entry);

    if self.inner.storage.is_persistent() {
      self.inner.dirty.store(true, Ordering::SeqCst);
      self.schedule_flush();
    }
  }

  /// Write pending changes now, cancelling the debounce timer.
  pub fn flush(&self) -> Result<()> {
    if let Some(handle) = self.inner.lock_pending().take() {
      handle.abort();
    }
    self.inner.write_if_dirty()
  }

  /// Drop every entry and remove the backing file.
  pub fn clear(&self) -> Result<()> {
    if let Some(handle) = self.inner.lock_pending().take() {
      handle.abort();
    }

    let _io = lock(&self.inner.io);
    self.inner.lock_entries().clear();
    self.inner.dirty.store(false, Ordering::SeqCst);
    self.inner.storage.remove()
  }

  fn schedule_flush(&self) {
    let mut pending = self.inner.lock_pending();
    if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
      return;
    }

    match tokio::runtime::Handle::try_current() {
      Ok(runtime) => {
        // The timer must not keep the cache alive; drop flushes instead
        let weak = Arc::downgrade(&self.inner);
        let debounce = self.inner.debounce;

        *pending = Some(runtime.spawn(async move {
          tokio::time::sleep(debounce).await;

          let Some(inner) = weak.upgrade() else {
            return;
          };
          inner.lock_pending().take();

          // File I/O stays off the runtime workers
          match tokio::task::spawn_blocking(move || inner.write_if_dirty()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Debounced request cache flush failed: {}", e),
            Err(e) => warn!("Debounced request cache flush panicked: {}", e),
          }
        }));
      }
      Err(_) => {
        // No runtime to host a timer, write through
        drop(pending);
        if let Err(e) = self.inner.write_if_dirty() {
          warn!("Request cache write failed: {}", e);
        }
      }
    }
  }
}

impl Inner {
  fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    lock(&self.entries)
  }

  fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    lock(&self.pending_flush)
  }

  fn write_if_dirty(&self) -> Result<()> {
    let _io = lock(&self.io);
    if !self.dirty.swap(false, Ordering::SeqCst) {
      return Ok(());
    }

    // Entries nobody reads again are only ever evicted here
    let now = now_ms();
    let snapshot = {
      let mut entries = self.lock_entries();
      entries.retain(|_, entry| !entry.is_expired(now));
      entries.clone()
    };

    if let Err(e) = self.storage.store(&snapshot) {
      self.dirty.store(true, Ordering::SeqCst);
      return Err(e);
    }

    debug!(entries = snapshot.len(), "Flushed request cache");
    Ok(())
  }
}

impl Drop for Inner {
  fn drop(&mut self) {
    if let Some(handle) = lock(&self.pending_flush).take() {
      handle.abort();
    }
    if let Err(e) = self.write_if_dirty() {
      warn!("Request cache flush on drop failed: {}", e);
    }
  }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
