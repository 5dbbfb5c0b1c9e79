//! Cache keys for GitHub API calls.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

use super::types::SubjectTarget;

/// Cacheable GitHub GET requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GitHubQueryKey {
  /// One page of the notification feed (read and unread)
  Notifications { page: u32, per_page: u32 },
  /// Issue detail
  Issue { owner: String, repo: String, number: u64 },
  /// Pull request detail
  PullRequest { owner: String, repo: String, number: u64 },
  /// Comment thread of an issue or pull request
  Comments { owner: String, repo: String, number: u64 },
}

impl GitHubQueryKey {
  pub fn issue(target: &SubjectTarget) -> Self {
    Self::Issue {
      owner: target.owner.clone(),
      repo: target.repo.clone(),
      number: target.number,
    }
  }

  pub fn pull_request(target: &SubjectTarget) -> Self {
    Self::PullRequest {
      owner: target.owner.clone(),
      repo: target.repo.clone(),
      number: target.number,
    }
  }

  pub fn comments(target: &SubjectTarget) -> Self {
    Self::Comments {
      owner: target.owner.clone(),
      repo: target.repo.clone(),
      number: target.number,
    }
  }

  /// Request path relative to the API root.
  pub fn path(&self) -> String {
    match self {
      Self::Notifications { page, per_page } => {
        format!("/notifications?all=true&page={}&per_page={}", page, per_page)
      }
      Self::Issue {
        owner,
        repo,
        number,
      } => format!("/repos/{}/{}/issues/{}", owner, repo, number),
      Self::PullRequest {
        owner,
        repo,
        number,
      } => format!("/repos/{}/{}/pulls/{}", owner, repo, number),
      // Pull request conversation comments live on the issues endpoint too
      Self::Comments {
        owner,
        repo,
        number,
      } => format!("/repos/{}/{}/issues/{}/comments", owner, repo, number),
    }
  }
}

impl QueryKey for GitHubQueryKey {
  fn cache_hash(&self) -> String {
    let input = format!("GET {}", self.path());

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    match self {
      Self::Notifications { page, .. } => format!("notifications page {}", page),
      Self::Issue {
        owner,
        repo,
        number,
      } => format!("issue {}/{}#{}", owner, repo, number),
      Self::PullRequest {
        owner,
        repo,
        number,
      } => format!("pull request {}/{}#{}", owner, repo, number),
      Self::Comments {
        owner,
        repo,
        number,
      } => format!("comments on {}/{}#{}", owner, repo, number),
    }
  }
}
