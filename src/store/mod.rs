//! Local notification state reconciled with GitHub.
//!
//! The store owns the canonical set of every notification seen so far, the
//! user's overrides, and the working set derived from them. Remote refreshes
//! go through the injected [`NotificationSource`]; every mutation is followed
//! by a snapshot write.

mod merge;
mod snapshot;
mod working_set;

pub use snapshot::SnapshotFile;

use std::sync::Arc;

use chrono::Utc;
use color_eyre::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::RequestCache;
use crate::config::Config;
use crate::github::types::{Notification, NotificationDetails, NotificationStats, Overrides};
use crate::github::NotificationSource;

use merge::{apply_custom_states, merge_fetched, Canonical, CustomStates};
use snapshot::Snapshot;
use working_set::{newest_first, WorkingSetManager};

/// Store tuning taken from configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
  pub per_page: u32,
  pub max_active: usize,
  pub issues_only: bool,
}

impl From<&Config> for StoreSettings {
  fn from(config: &Config) -> Self {
    Self {
      per_page: config.github.per_page,
      max_active: config.inbox.max_active,
      issues_only: config.inbox.issues_only,
    }
  }
}

struct StoreState {
  canonical: Canonical,
  custom_states: CustomStates,
  working_set: WorkingSetManager,
  /// Epoch ms, 0 if never synced
  last_sync: i64,
  is_online: bool,
}

impl StoreState {
  fn empty(settings: &StoreSettings) -> Self {
    Self {
      canonical: Canonical::new(),
      custom_states: CustomStates::new(),
      working_set: WorkingSetManager::new(settings.max_active, settings.issues_only),
      last_sync: 0,
      is_online: true,
    }
  }

  fn restore(snapshot: Snapshot, settings: &StoreSettings) -> Self {
    let mut canonical: Canonical = snapshot
      .notifications
      .into_iter()
      .map(|n| (n.id.clone(), n))
      .collect();
    apply_custom_states(&mut canonical, &snapshot.custom_states);

    // An expanded inbox stays expanded, a larger configured one wins
    let max_active = snapshot
      .max_active
      .map_or(settings.max_active, |persisted| persisted.max(settings.max_active));

    let mut state = Self {
      canonical,
      custom_states: snapshot.custom_states,
      working_set: WorkingSetManager::new(max_active, settings.issues_only)
        .with_ids(snapshot.active_batch_ids),
      last_sync: snapshot.last_sync,
      is_online: true,
    };
    state.recompute();
    state
  }

  fn recompute(&mut self) {
    self.working_set.recompute(self.canonical.values());
  }

  fn snapshot(&self) -> Snapshot {
    Snapshot {
      notifications: self.canonical.values().cloned().collect(),
      last_sync: self.last_sync,
      active_batch_ids: self.working_set.ids().to_vec(),
      custom_states: self.custom_states.clone(),
      max_active: Some(self.working_set.max_active()),
    }
  }

  fn working_set_notifications(&self) -> Vec<Notification> {
    self
      .working_set
      .ids()
      .iter()
      .filter_map(|id| self.canonical.get(id))
      .cloned()
      .collect()
  }
}

/// Canonical notification set plus the working set derived from it.
pub struct NotificationStore {
  source: Arc<dyn NotificationSource>,
  cache: RequestCache,
  snapshot: SnapshotFile,
  settings: StoreSettings,
  state: Mutex<StoreState>,
  /// Held for the whole of `sync`/`fetch_all` so refreshes queue up
  refresh: Mutex<()>,
}

impl NotificationStore {
  /// Open the store, restoring the snapshot if there is one.
  ///
  /// `cache` must be the same request cache `source` reads through; the store
  /// owns its lifecycle (cleared on reset, flushed on shutdown).
  pub async fn open(
    settings: StoreSettings,
    source: Arc<dyn NotificationSource>,
    cache: RequestCache,
    snapshot: SnapshotFile,
  ) -> Self {
    let state = StoreState::restore(snapshot.load().await, &settings);
    info!(
      path = %snapshot.path().display(),
      notifications = state.canonical.len(),
      working_set = state.working_set.len(),
      "Opened notification store"
    );

    Self {
      source,
      cache,
      snapshot,
      settings,
      state: Mutex::new(state),
      refresh: Mutex::new(()),
    }
  }

  // ==========================================================================
  // Remote refresh
  // ==========================================================================

  /// Refresh from the most recent page of the feed.
  pub async fn sync(&self) -> Result<()> {
    let _refresh = self.refresh.lock().await;
    let fetched = self
      .source
      .list_notifications(1, self.settings.per_page)
      .await;
    self.apply_fetch("sync", fetched).await
  }

  /// Refresh from every page of the feed.
  pub async fn fetch_all(&self) -> Result<()> {
    let _refresh = self.refresh.lock().await;
    let fetched = self.fetch_every_page().await;
    self.apply_fetch("fetch_all", fetched).await
  }

  async fn fetch_every_page(&self) -> Result<Vec<Notification>> {
    let mut all = Vec::new();
    let mut page = 1;

    loop {
      let batch = self
        .source
        .list_notifications(page, self.settings.per_page)
        .await?;
      if batch.is_empty() {
        break;
      }
      all.extend(batch);
      page += 1;
    }

    debug!(pages = page - 1, notifications = all.len(), "Fetched feed");
    Ok(all)
  }

  async fn apply_fetch(&self, op: &str, fetched: Result<Vec<Notification>>) -> Result<()> {
    let mut guard = self.state.lock().await;
    let state = &mut *guard;

    let fetched = match fetched {
      Ok(fetched) => fetched,
      Err(e) => {
        state.is_online = false;
        warn!(op, "Remote fetch failed, going offline: {}", e);
        return Err(e);
      }
    };

    let count = fetched.len();
    merge_fetched(&mut state.canonical, &state.custom_states, fetched);
    state.is_online = true;
    state.last_sync = now_ms();
    state.recompute();
    self.persist(state).await;

    info!(
      op,
      fetched = count,
      total = state.canonical.len(),
      working_set = state.working_set.len(),
      "Merged notifications"
    );
    Ok(())
  }

  /// Confirm the credentials work with a minimal remote call.
  pub async fn validate_token(&self) -> Result<()> {
    let result = self.source.validate_token().await;
    self.state.lock().await.is_online = result.is_ok();
    result
  }

  // ==========================================================================
  // Views
  // ==========================================================================

  /// Working set in order. Tops it up from the feed first when it has free
  /// slots; a failed refresh falls back to what is already known.
  pub async fn get_in_progress(&self) -> Vec<Notification> {
    let full = self.state.lock().await.working_set.is_full();
    if !full {
      if let Err(e) = self.sync().await {
        warn!("Serving last known working set: {}", e);
      }
    }

    self.state.lock().await.working_set_notifications()
  }

  /// Every known notification, newest first. Loads the whole feed when
  /// nothing is known yet; a failed load falls back to the empty set.
  pub async fn get_all(&self) -> Vec<Notification> {
    let empty = self.state.lock().await.canonical.is_empty();
    if empty {
      if let Err(e) = self.fetch_all().await {
        warn!("Serving last known notifications: {}", e);
      }
    }

    let state = self.state.lock().await;
    let mut all: Vec<Notification> = state.canonical.values().cloned().collect();
    all.sort_by(newest_first);
    all
  }

  /// Notifications marked done, newest first.
  pub async fn get_done(&self) -> Vec<Notification> {
    let state = self.state.lock().await;
    let mut done: Vec<Notification> = state
      .canonical
      .values()
      .filter(|n| n.is_done())
      .cloned()
      .collect();
    done.sort_by(newest_first);
    done
  }

  /// The notification plus its issue or pull request and comments.
  ///
  /// Returns `None` only for an unknown id. Remote failures degrade to the
  /// bare notification.
  pub async fn get_notification_details(&self, id: &str) -> Option<NotificationDetails> {
    let notification = self.state.lock().await.canonical.get(id).cloned()?;

    let Some(target) = notification.subject_target() else {
      return Some(NotificationDetails::bare(notification));
    };

    let (detail, comments) = futures::join!(
      self.source.subject_detail(&target),
      self.source.comments(&target)
    );

    let detail = match detail {
      Ok(detail) => detail,
      Err(e) => {
        warn!(id, "Failed to fetch subject detail: {}", e);
        return Some(NotificationDetails::bare(notification));
      }
    };

    let comments = match comments {
      Ok(comments) => Some(comments),
      Err(e) => {
        warn!(id, "Failed to fetch comments: {}", e);
        None
      }
    };

    Some(NotificationDetails {
      notification,
      detail: Some(detail),
      comments,
    })
  }

  pub async fn get_stats(&self) -> NotificationStats {
    let state = self.state.lock().await;
    let notifications = state.canonical.values();

    NotificationStats {
      total: state.canonical.len(),
      unread: notifications.clone().filter(|n| n.unread).count(),
      working_set_unread: state
        .working_set_notifications()
        .iter()
        .filter(|n| !n.is_read())
        .count(),
      done: notifications.filter(|n| n.is_done()).count(),
      working_set_size: state.working_set.len(),
      last_sync: state.last_sync,
      is_online: state.is_online,
    }
  }

  // ==========================================================================
  // User actions
  // ==========================================================================

  /// Returns false if `id` is unknown.
  pub async fn mark_as_read(&self, id: &str) -> bool {
    self
      .update_overrides(id, false, |o| {
        o.is_read = Some(true);
        o.last_viewed_at = Some(now_ms());
      })
      .await
      .is_some()
  }

  /// Returns false if `id` is unknown.
  pub async fn mark_as_unread(&self, id: &str) -> bool {
    self
      .update_overrides(id, false, |o| o.is_read = Some(false))
      .await
      .is_some()
  }

  /// Returns false if `id` is unknown.
  pub async fn set_priority(&self, id: &str, priority: i32) -> bool {
    self
      .update_overrides(id, false, |o| o.priority = Some(priority))
      .await
      .is_some()
  }

  /// Mark done locally, refill the working set, then tell GitHub.
  ///
  /// The local change stands even if GitHub rejects it. Returns false if `id`
  /// is unknown.
  pub async fn mark_as_done(&self, id: &str) -> bool {
    let Some(notification) = self
      .update_overrides(id, true, |o| {
        o.is_done = Some(true);
        o.is_read = Some(true);
      })
      .await
    else {
      return false;
    };

    match notification.thread_id() {
      Some(thread_id) => {
        if let Err(e) = self.source.mark_thread_done(thread_id).await {
          warn!(id, "Failed to mark thread done on GitHub: {}", e);
        }
      }
      None => warn!(id, "Not a numeric thread id, skipping GitHub update"),
    }

    true
  }

  /// Apply `update` to the overrides of `id`, mirror them into the custom
  /// states and persist. Returns the updated notification.
  async fn update_overrides(
    &self,
    id: &str,
    recompute: bool,
    update: impl FnOnce(&mut Overrides),
  ) -> Option<Notification> {
    let mut guard = self.state.lock().await;
    let state = &mut *guard;

    let Some(notification) = state.canonical.get_mut(id) else {
      debug!(id, "Ignoring update for unknown notification");
      return None;
    };
    update(&mut notification.overrides);
    state
      .custom_states
      .insert(id.to_string(), notification.overrides.clone());
    let updated = notification.clone();

    if recompute {
      state.recompute();
    }
    self.persist(state).await;

    Some(updated)
  }

  /// Grow the working set limit by `extra` and refill.
  pub async fn expand_inbox_limit(&self, extra: usize) {
    let mut state = self.state.lock().await;
    state.working_set.expand(extra);
    state.recompute();
    self.persist(&state).await;

    info!(max_active = state.working_set.max_active(), "Expanded inbox");
  }

  /// Forget everything: in-memory state, the snapshot file and the request
  /// cache.
  pub async fn reset_storage(&self) {
    // Keep an in-flight refresh from merging into the emptied state
    let _refresh = self.refresh.lock().await;
    let mut state = self.state.lock().await;
    *state = StoreState::empty(&self.settings);

    if let Err(e) = self.snapshot.remove().await {
      warn!("Failed to remove snapshot: {}", e);
    }
    if let Err(e) = self.cache.clear() {
      warn!("Failed to clear request cache: {}", e);
    }

    info!("Reset local storage");
  }

  /// Write out anything still pending. Call before exiting.
  pub fn shutdown(&self) -> Result<()> {
    self.cache.flush()
  }

  async fn persist(&self, state: &StoreState) {
    if let Err(e) = self.snapshot.save(&state.snapshot()).await {
      warn!("Failed to persist snapshot: {}", e);
    }
  }
}

fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
