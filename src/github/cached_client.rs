//! Cached GitHub client that wraps GitHubClient with transparent caching.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cache::{QueryKey, RequestCache};

use super::api_types::{ApiComment, ApiIssue, ApiNotification, ApiPullRequest};
use super::cache::GitHubQueryKey;
use super::client::GitHubClient;
use super::types::{Comment, Notification, SubjectDetail, SubjectTarget, SubjectType};
use super::NotificationSource;

/// GitHub client with transparent response caching.
///
/// GETs are answered from the request cache while fresh; writes and token
/// validation always go to the network.
#[derive(Clone)]
pub struct CachedGitHubClient {
  inner: GitHubClient,
  cache: RequestCache,
}

impl CachedGitHubClient {
  pub fn new(inner: GitHubClient, cache: RequestCache) -> Self {
    Self { inner, cache }
  }

  /// Fetch and parse `key`, going through the cache.
  ///
  /// Only bodies that parse are cached, so a malformed response is retried
  /// on the next call.
  async fn cached_get<T: DeserializeOwned>(&self, key: &GitHubQueryKey) -> Result<T> {
    let hash = key.cache_hash();

    if let Some(body) = self.cache.get(&hash) {
      debug!(request = %key.description(), "cache hit");
      return parse(key, &body);
    }

    let body = self.inner.get_text(&key.path()).await?;
    let parsed = parse(key, &body)?;
    self.cache.set(hash, body);

    Ok(parsed)
  }
}

fn parse<T: DeserializeOwned>(key: &GitHubQueryKey, body: &str) -> Result<T> {
  serde_json::from_str(body).map_err(|e| eyre!("Failed to parse {}: {}", key.description(), e))
}

#[async_trait]
impl NotificationSource for CachedGitHubClient {
  async fn list_notifications(&self, page: u32, per_page: u32) -> Result<Vec<Notification>> {
    let key = GitHubQueryKey::Notifications { page, per_page };
    let items: Vec<ApiNotification> = self.cached_get(&key).await?;

    Ok(
      items
        .into_iter()
        .map(ApiNotification::into_notification)
        .collect(),
    )
  }

  async fn mark_thread_done(&self, thread_id: u64) -> Result<()> {
    self.inner.mark_thread_done(thread_id).await
  }

  async fn subject_detail(&self, target: &SubjectTarget) -> Result<SubjectDetail> {
    match target.kind {
      SubjectType::Issue => {
        let issue: ApiIssue = self.cached_get(&GitHubQueryKey::issue(target)).await?;
        Ok(SubjectDetail::Issue(issue.into()))
      }
      SubjectType::PullRequest => {
        let pr: ApiPullRequest = self
          .cached_get(&GitHubQueryKey::pull_request(target))
          .await?;
        Ok(SubjectDetail::PullRequest(pr.into()))
      }
      SubjectType::Other(ref kind) => Err(eyre!("No detail available for {} subjects", kind)),
    }
  }

  async fn comments(&self, target: &SubjectTarget) -> Result<Vec<Comment>> {
    let comments: Vec<ApiComment> = self.cached_get(&GitHubQueryKey::comments(target)).await?;
    Ok(comments.into_iter().map(Comment::from).collect())
  }

  async fn validate_token(&self) -> Result<()> {
    self.inner.validate_token().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use std::time::Duration;
  use wiremock::matchers::{header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// Client whose network calls can only fail.
  fn offline_client() -> CachedGitHubClient {
    let mut config = Config::default();
    config.github.api_url = "http://127.0.0.1:9".to_string();
    config.github.timeout_secs = 2;

    let inner = GitHubClient::with_token(&config, "token".to_string()).unwrap();
    CachedGitHubClient::new(inner, RequestCache::in_memory(Duration::from_secs(60)))
  }

  const PAGE: &str = r#"[{
    "id": "1",
    "reason": "assign",
    "unread": true,
    "updated_at": "2024-01-01T00:00:00Z",
    "url": "https://api.github.com/notifications/threads/1",
    "repository": { "full_name": "acme/hub", "name": "hub", "owner": { "login": "acme" } },
    "subject": { "title": "Crash", "type": "Issue", "url": null, "latest_comment_url": null }
  }]"#;

  /// Client pointed at a local mock GitHub.
  fn client_for(server: &MockServer) -> CachedGitHubClient {
    let mut config = Config::default();
    config.github.api_url = server.uri();

    let inner = GitHubClient::with_token(&config, "token".to_string()).unwrap();
    CachedGitHubClient::new(inner, RequestCache::in_memory(Duration::from_secs(60)))
  }

  fn page_key() -> GitHubQueryKey {
    GitHubQueryKey::Notifications {
      page: 1,
      per_page: 50,
    }
  }

  #[tokio::test]
  async fn test_network_page_is_cached_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/notifications"))
      .and(query_param("page", "1"))
      .and(header("authorization", "Bearer token"))
      .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
      .expect(1)
      .mount(&server)
      .await;
    let client = client_for(&server);

    let first = client.list_notifications(1, 50).await.unwrap();
    assert!(client.cache.get(&page_key().cache_hash()).is_some());

    let second = client.list_notifications(1, 50).await.unwrap();
    assert_eq!(first, second);

    server.verify().await;
  }

  #[tokio::test]
  async fn test_error_status_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/notifications"))
      .respond_with(ResponseTemplate::new(502))
      .expect(2)
      .mount(&server)
      .await;
    let client = client_for(&server);

    assert!(client.list_notifications(1, 50).await.is_err());
    assert!(client.cache.get(&page_key().cache_hash()).is_none());
    assert!(client.list_notifications(1, 50).await.is_err());

    server.verify().await;
  }

  #[tokio::test]
  async fn test_unparseable_body_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/repos/acme/hub/issues/3"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
      .expect(2)
      .mount(&server)
      .await;
    let client = client_for(&server);
    let target = SubjectTarget {
      owner: "acme".to_string(),
      repo: "hub".to_string(),
      number: 3,
      kind: SubjectType::Issue,
    };

    assert!(client.subject_detail(&target).await.is_err());
    assert!(client
      .cache
      .get(&GitHubQueryKey::issue(&target).cache_hash())
      .is_none());
    assert!(client.subject_detail(&target).await.is_err());

    server.verify().await;
  }

  #[tokio::test]
  async fn test_mark_done_always_reaches_github() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/notifications/threads/7"))
      .respond_with(ResponseTemplate::new(205))
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(method("PATCH"))
      .and(path("/notifications/threads/8"))
      .respond_with(ResponseTemplate::new(403))
      .expect(1)
      .mount(&server)
      .await;
    let client = client_for(&server);

    client.mark_thread_done(7).await.unwrap();
    client.mark_thread_done(7).await.unwrap();
    assert!(client.mark_thread_done(8).await.is_err());

    server.verify().await;
  }

  #[tokio::test]
  async fn test_validate_token_bypasses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/notifications"))
      .and(query_param("per_page", "1"))
      .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
      .expect(2)
      .mount(&server)
      .await;
    let client = client_for(&server);

    client.validate_token().await.unwrap();
    client.validate_token().await.unwrap();

    server.verify().await;
  }

  #[tokio::test]
  async fn test_rejected_token_fails_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/notifications"))
      .respond_with(ResponseTemplate::new(401))
      .mount(&server)
      .await;

    assert!(client_for(&server).validate_token().await.is_err());
  }

  #[tokio::test]
  async fn test_fresh_cache_entry_skips_network() {
    let client = offline_client();
    let key = GitHubQueryKey::Notifications {
      page: 1,
      per_page: 50,
    };
    client.cache.set(key.cache_hash(), PAGE);

    let page = client.list_notifications(1, 50).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].subject.title, "Crash");
  }

  #[tokio::test]
  async fn test_cache_miss_surfaces_network_error() {
    let client = offline_client();
    assert!(client.list_notifications(2, 50).await.is_err());
  }

  #[tokio::test]
  async fn test_other_subjects_have_no_detail() {
    let client = offline_client();
    let target = SubjectTarget {
      owner: "acme".to_string(),
      repo: "hub".to_string(),
      number: 1,
      kind: SubjectType::Other("Release".to_string()),
    };

    assert!(client.subject_detail(&target).await.is_err());
  }
}
