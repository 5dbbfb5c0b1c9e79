//! Domain types for GitHub notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// What a notification thread is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubjectType {
  Issue,
  PullRequest,
  /// Discussions, releases, check suites, ... carried as-is
  Other(String),
}

impl SubjectType {
  pub fn as_str(&self) -> &str {
    match self {
      SubjectType::Issue => "Issue",
      SubjectType::PullRequest => "PullRequest",
      SubjectType::Other(kind) => kind,
    }
  }
}

impl From<String> for SubjectType {
  fn from(value: String) -> Self {
    match value.as_str() {
      "Issue" => SubjectType::Issue,
      "PullRequest" => SubjectType::PullRequest,
      _ => SubjectType::Other(value),
    }
  }
}

impl From<SubjectType> for String {
  fn from(value: SubjectType) -> Self {
    value.as_str().to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
  pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
  pub full_name: String,
  pub name: String,
  pub owner: Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub title: String,
  #[serde(rename = "type")]
  pub kind: SubjectType,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub latest_comment_url: Option<String>,
}

/// Local annotations on a notification.
///
/// Every field is optional: `None` means "no local opinion", so whatever the
/// previous state held wins on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Overrides {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_read: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_done: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<i32>,
  /// Epoch milliseconds
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_viewed_at: Option<i64>,
}

impl Overrides {
  /// Field-wise fallback: keep what `self` sets, take the rest from `fallback`.
  pub fn or(self, fallback: Overrides) -> Overrides {
    Overrides {
      is_read: self.is_read.or(fallback.is_read),
      is_done: self.is_done.or(fallback.is_done),
      priority: self.priority.or(fallback.priority),
      last_viewed_at: self.last_viewed_at.or(fallback.last_viewed_at),
    }
  }
}

/// A notification thread as known locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id: String,
  pub reason: String,
  pub repository: Repository,
  pub subject: Subject,
  pub updated_at: DateTime<Utc>,
  pub unread: bool,
  /// Thread API url
  #[serde(default)]
  pub url: String,
  #[serde(flatten)]
  pub overrides: Overrides,
}

impl Notification {
  pub fn is_read(&self) -> bool {
    self.overrides.is_read.unwrap_or(false)
  }

  pub fn is_done(&self) -> bool {
    self.overrides.is_done.unwrap_or(false)
  }

  /// Numeric thread id used by the threads endpoint.
  pub fn thread_id(&self) -> Option<u64> {
    self.id.parse().ok()
  }

  /// Where the issue or pull request behind this notification lives.
  ///
  /// The number is the trailing path segment of the subject url, e.g.
  /// `https://api.github.com/repos/acme/hub/issues/123`.
  pub fn subject_target(&self) -> Option<SubjectTarget> {
    let url = Url::parse(self.subject.url.as_deref()?).ok()?;
    let number = url
      .path_segments()?
      .filter(|segment| !segment.is_empty())
      .last()?
      .parse()
      .ok()?;

    Some(SubjectTarget {
      owner: self.repository.owner.login.clone(),
      repo: self.repository.name.clone(),
      number,
      kind: self.subject.kind.clone(),
    })
  }
}

/// Owner/repo/number triple for the detail endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTarget {
  pub owner: String,
  pub repo: String,
  pub number: u64,
  pub kind: SubjectType,
}

/// Issue body and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetail {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub state: String,
  pub author: Option<String>,
  pub html_url: String,
  pub labels: Vec<String>,
  pub comment_count: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Pull request body and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetail {
  pub number: u64,
  pub title: String,
  pub body: Option<String>,
  pub state: String,
  pub author: Option<String>,
  pub html_url: String,
  pub draft: bool,
  pub merged: bool,
  pub head_ref: String,
  pub base_ref: String,
  pub additions: Option<u64>,
  pub deletions: Option<u64>,
  pub changed_files: Option<u64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubjectDetail {
  Issue(IssueDetail),
  PullRequest(PullRequestDetail),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id: u64,
  pub author: String,
  pub avatar_url: Option<String>,
  pub body: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A notification plus whatever extra context could be fetched for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDetails {
  pub notification: Notification,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub detail: Option<SubjectDetail>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comments: Option<Vec<Comment>>,
}

impl NotificationDetails {
  pub fn bare(notification: Notification) -> Self {
    Self {
      notification,
      detail: None,
      comments: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
  pub total: usize,
  /// Unread according to GitHub
  pub unread: usize,
  /// Working set members not yet read locally
  pub working_set_unread: usize,
  pub done: usize,
  pub working_set_size: usize,
  /// Epoch milliseconds, 0 if never synced
  pub last_sync: i64,
  pub is_online: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn notification(subject_url: Option<&str>) -> Notification {
    Notification {
      id: "42".to_string(),
      reason: "mention".to_string(),
      repository: Repository {
        full_name: "acme/hub".to_string(),
        name: "hub".to_string(),
        owner: Owner {
          login: "acme".to_string(),
        },
      },
      subject: Subject {
        title: "Broken build".to_string(),
        kind: SubjectType::Issue,
        url: subject_url.map(String::from),
        latest_comment_url: None,
      },
      updated_at: "2024-01-01T00:00:00Z".parse().unwrap(),
      unread: true,
      url: String::new(),
      overrides: Overrides::default(),
    }
  }

  #[test]
  fn test_subject_target_from_url() {
    let n = notification(Some("https://api.github.com/repos/acme/hub/issues/123"));
    let target = n.subject_target().unwrap();

    assert_eq!(target.owner, "acme");
    assert_eq!(target.repo, "hub");
    assert_eq!(target.number, 123);
    assert_eq!(target.kind, SubjectType::Issue);
  }

  #[test]
  fn test_subject_target_requires_numeric_tail() {
    assert!(notification(None).subject_target().is_none());
    assert!(notification(Some("https://api.github.com/repos/acme/hub/releases/latest"))
      .subject_target()
      .is_none());
  }

  #[test]
  fn test_subject_type_round_trips_unknown_kinds() {
    assert_eq!(SubjectType::from("Issue".to_string()), SubjectType::Issue);
    let kind = SubjectType::from("Discussion".to_string());
    assert_eq!(String::from(kind), "Discussion");
  }

  #[test]
  fn test_overrides_or_prefers_set_fields() {
    let local = Overrides {
      is_read: Some(true),
      ..Default::default()
    };
    let previous = Overrides {
      is_read: Some(false),
      priority: Some(2),
      ..Default::default()
    };

    let merged = local.or(previous);
    assert_eq!(merged.is_read, Some(true));
    assert_eq!(merged.priority, Some(2));
    assert_eq!(merged.is_done, None);
  }

  #[test]
  fn test_overrides_flatten_as_camel_case() {
    let mut n = notification(None);
    n.overrides.is_done = Some(true);

    let value = serde_json::to_value(&n).unwrap();
    assert_eq!(value["isDone"], serde_json::json!(true));
    assert!(value.get("isRead").is_none());
    assert_eq!(value["subject"]["type"], serde_json::json!("Issue"));

    let back: Notification = serde_json::from_value(value).unwrap();
    assert_eq!(back, n);
  }
}
