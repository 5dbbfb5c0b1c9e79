//! GitHub REST access: payload types, domain types, and a cached client.

pub mod api_types;
pub mod cache;
pub mod cached_client;
pub mod client;
pub mod types;

use async_trait::async_trait;
use color_eyre::Result;

use types::{Comment, Notification, SubjectDetail, SubjectTarget};

/// Remote operations the notification store depends on.
#[async_trait]
pub trait NotificationSource: Send + Sync {
  /// One page of the feed, 1-based. An empty page means the end.
  async fn list_notifications(&self, page: u32, per_page: u32) -> Result<Vec<Notification>>;

  /// Acknowledge a thread remotely.
  async fn mark_thread_done(&self, thread_id: u64) -> Result<()>;

  /// Issue or pull request body for `target`.
  async fn subject_detail(&self, target: &SubjectTarget) -> Result<SubjectDetail>;

  /// Comment thread for `target`.
  async fn comments(&self, target: &SubjectTarget) -> Result<Vec<Comment>>;

  /// Cheapest call that proves the credentials work. Never cached.
  async fn validate_token(&self) -> Result<()>;
}
