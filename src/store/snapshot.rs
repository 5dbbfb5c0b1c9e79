//! File-backed snapshot of store state.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::github::types::Notification;

use super::merge::CustomStates;

/// Everything the store persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
  pub notifications: Vec<Notification>,
  /// Epoch milliseconds of the last successful sync
  pub last_sync: i64,
  pub active_batch_ids: Vec<String>,
  pub custom_states: CustomStates,
  /// Working set limit after any expansion
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_active: Option<usize>,
}

/// JSON snapshot file.
pub struct SnapshotFile {
  path: PathBuf,
}

impl SnapshotFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read the snapshot. A missing file is an empty snapshot; unreadable or
  /// corrupt files are logged and also yield an empty snapshot.
  pub async fn load(&self) -> Snapshot {
    let contents = match tokio::fs::read_to_string(&self.path).await {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "No snapshot yet");
        return Snapshot::default();
      }
      Err(e) => {
        warn!("Failed to read snapshot {}: {}", self.path.display(), e);
        return Snapshot::default();
      }
    };

    match serde_json::from_str(&contents) {
      Ok(snapshot) => snapshot,
      Err(e) => {
        warn!("Ignoring corrupt snapshot {}: {}", self.path.display(), e);
        Snapshot::default()
      }
    }
  }

  pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let data = serde_json::to_vec_pretty(snapshot)
      .map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;

    // Write aside and rename over, so a crash never leaves a truncated file
    let temp = self.temp_path();
    tokio::fs::write(&temp, data)
      .await
      .map_err(|e| eyre!("Failed to write snapshot {}: {}", temp.display(), e))?;
    tokio::fs::rename(&temp, &self.path)
      .await
      .map_err(|e| eyre!("Failed to replace snapshot {}: {}", self.path.display(), e))
  }

  fn temp_path(&self) -> PathBuf {
    self.path.with_extension("json.tmp")
  }

  /// Delete the snapshot. A missing file is not an error.
  pub async fn remove(&self) -> Result<()> {
    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!(
        "Failed to remove snapshot {}: {}",
        self.path.display(),
        e
      )),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::github::types::{Overrides, Owner, Repository, Subject, SubjectType};

  fn snapshot() -> Snapshot {
    let notification = Notification {
      id: "7".to_string(),
      reason: "mention".to_string(),
      repository: Repository {
        full_name: "octo/hub".to_string(),
        name: "hub".to_string(),
        owner: Owner {
          login: "octo".to_string(),
        },
      },
      subject: Subject {
        title: "Flaky test".to_string(),
        kind: SubjectType::PullRequest,
        url: Some("https://api.github.com/repos/octo/hub/pulls/7".to_string()),
        latest_comment_url: None,
      },
      updated_at: "2024-04-01T12:00:00Z".parse().unwrap(),
      unread: false,
      url: "https://api.github.com/notifications/threads/7".to_string(),
      overrides: Overrides {
        is_read: Some(true),
        ..Default::default()
      },
    };

    let mut custom_states = CustomStates::new();
    custom_states.insert("7".to_string(), notification.overrides.clone());

    Snapshot {
      notifications: vec![notification],
      last_sync: 1_700_000_000_000,
      active_batch_ids: vec!["7".to_string()],
      custom_states,
      max_active: Some(20),
    }
  }

  #[tokio::test]
  async fn test_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("data").join("notifications.json"));

    file.save(&snapshot()).await.unwrap();
    assert_eq!(file.load().await, snapshot());
  }

  #[tokio::test]
  async fn test_missing_fields_default() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("notifications.json"));
    tokio::fs::write(file.path(), r#"{"lastSync": 5}"#)
      .await
      .unwrap();

    let loaded = file.load().await;
    assert_eq!(loaded.last_sync, 5);
    assert!(loaded.notifications.is_empty());
    assert!(loaded.custom_states.is_empty());
    assert_eq!(loaded.max_active, None);
  }

  #[tokio::test]
  async fn test_corrupt_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("notifications.json"));
    tokio::fs::write(file.path(), "[[[").await.unwrap();

    assert_eq!(file.load().await, Snapshot::default());
  }

  #[tokio::test]
  async fn test_remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("notifications.json"));

    file.save(&Snapshot::default()).await.unwrap();
    file.remove().await.unwrap();
    assert!(!file.path().exists());
    file.remove().await.unwrap();
  }

  #[tokio::test]
  async fn test_save_replaces_file_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("notifications.json"));

    file.save(&Snapshot::default()).await.unwrap();
    file.save(&snapshot()).await.unwrap();

    assert_eq!(file.load().await, snapshot());
    assert!(!file.temp_path().exists());
  }

  #[tokio::test]
  async fn test_interrupted_write_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("notifications.json"));
    file.save(&snapshot()).await.unwrap();

    // A write that died halfway only ever touches the side file
    let full = serde_json::to_vec_pretty(&snapshot()).unwrap();
    tokio::fs::write(file.temp_path(), &full[..full.len() / 2])
      .await
      .unwrap();

    assert_eq!(file.load().await, snapshot());

    // The next save replaces the stale side file
    file.save(&snapshot()).await.unwrap();
    assert!(!file.temp_path().exists());
  }

  #[test]
  fn test_readers_never_see_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notifications.json");
    let file = SnapshotFile::new(&path);

    let mut big = snapshot();
    let template = big.notifications[0].clone();
    big.notifications = (0..500)
      .map(|i| {
        let mut n = template.clone();
        n.id = i.to_string();
        n
      })
      .collect();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(file.save(&big)).unwrap();

    let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let reader = {
      let done = done.clone();
      let path = path.clone();
      std::thread::spawn(move || {
        let mut reads = 0;
        while !done.load(std::sync::atomic::Ordering::SeqCst) {
          let contents = std::fs::read_to_string(&path).unwrap();
          let parsed: Snapshot = serde_json::from_str(&contents).unwrap();
          assert_eq!(parsed.notifications.len(), 500);
          reads += 1;
        }
        reads
      })
    };

    runtime.block_on(async {
      for _ in 0..50 {
        file.save(&big).await.unwrap();
      }
    });
    done.store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(reader.join().unwrap() > 0);
  }

  #[test]
  fn test_wire_field_names() {
    let value = serde_json::to_value(snapshot()).unwrap();

    assert!(value.get("activeBatchIds").is_some());
    assert!(value.get("customStates").is_some());
    assert_eq!(value["lastSync"], serde_json::json!(1_700_000_000_000i64));
    assert_eq!(value["customStates"]["7"]["isRead"], serde_json::json!(true));
  }
}
