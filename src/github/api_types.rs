//! Serde-deserializable types matching GitHub REST responses.
//!
//! These types are separate from domain types so that only the fields the
//! store consumes cross the API boundary. Anything else GitHub sends is
//! ignored during deserialization.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{
  Comment, IssueDetail, Notification, Overrides, Owner, PullRequestDetail, Repository, Subject,
  SubjectType,
};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub login: String,
  #[serde(default)]
  pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLabel {
  pub name: String,
}

// ============================================================================
// Notifications endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiOwner {
  pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiRepository {
  pub full_name: String,
  pub name: String,
  pub owner: ApiOwner,
}

#[derive(Debug, Deserialize)]
pub struct ApiSubject {
  #[serde(default)]
  pub title: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub url: Option<String>,
  pub latest_comment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiNotification {
  pub id: String,
  #[serde(default)]
  pub reason: String,
  pub repository: ApiRepository,
  pub subject: ApiSubject,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub unread: bool,
  #[serde(default)]
  pub url: String,
}

impl ApiNotification {
  /// Convert to the domain type. Fetched notifications carry no overrides.
  pub fn into_notification(self) -> Notification {
    Notification {
      id: self.id,
      reason: self.reason,
      repository: Repository {
        full_name: self.repository.full_name,
        name: self.repository.name,
        owner: Owner {
          login: self.repository.owner.login,
        },
      },
      subject: Subject {
        title: self.subject.title,
        kind: SubjectType::from(self.subject.kind),
        url: self.subject.url,
        latest_comment_url: self.subject.latest_comment_url,
      },
      updated_at: self.updated_at,
      unread: self.unread,
      url: self.url,
      overrides: Overrides::default(),
    }
  }
}

// ============================================================================
// Issue and pull request endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub number: u64,
  #[serde(default)]
  pub title: String,
  pub body: Option<String>,
  #[serde(default)]
  pub state: String,
  pub user: Option<ApiUser>,
  #[serde(default)]
  pub html_url: String,
  #[serde(default)]
  pub labels: Vec<ApiLabel>,
  #[serde(default)]
  pub comments: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ApiIssue> for IssueDetail {
  fn from(issue: ApiIssue) -> Self {
    IssueDetail {
      number: issue.number,
      title: issue.title,
      body: issue.body,
      state: issue.state,
      author: issue.user.map(|u| u.login),
      html_url: issue.html_url,
      labels: issue.labels.into_iter().map(|l| l.name).collect(),
      comment_count: issue.comments,
      created_at: issue.created_at,
      updated_at: issue.updated_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiBranchRef {
  #[serde(rename = "ref")]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPullRequest {
  pub number: u64,
  #[serde(default)]
  pub title: String,
  pub body: Option<String>,
  #[serde(default)]
  pub state: String,
  pub user: Option<ApiUser>,
  #[serde(default)]
  pub html_url: String,
  #[serde(default)]
  pub draft: bool,
  #[serde(default)]
  pub merged: bool,
  pub head: ApiBranchRef,
  pub base: ApiBranchRef,
  pub additions: Option<u64>,
  pub deletions: Option<u64>,
  pub changed_files: Option<u64>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ApiPullRequest> for PullRequestDetail {
  fn from(pr: ApiPullRequest) -> Self {
    PullRequestDetail {
      number: pr.number,
      title: pr.title,
      body: pr.body,
      state: pr.state,
      author: pr.user.map(|u| u.login),
      html_url: pr.html_url,
      draft: pr.draft,
      merged: pr.merged,
      head_ref: pr.head.name,
      base_ref: pr.base.name,
      additions: pr.additions,
      deletions: pr.deletions,
      changed_files: pr.changed_files,
      created_at: pr.created_at,
      updated_at: pr.updated_at,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiComment {
  pub id: u64,
  pub user: Option<ApiUser>,
  #[serde(default)]
  pub body: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ApiComment> for Comment {
  fn from(comment: ApiComment) -> Self {
    let (author, avatar_url) = match comment.user {
      Some(user) => (user.login, user.avatar_url),
      None => ("ghost".to_string(), None),
    };

    Comment {
      id: comment.id,
      author,
      avatar_url,
      body: comment.body,
      created_at: comment.created_at,
      updated_at: comment.updated_at,
    }
  }
}
