use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::config::Config;

/// GitHub REST client wrapper
#[derive(Clone)]
pub struct GitHubClient {
  http: reqwest::Client,
  api_url: String,
  token: String,
}

impl GitHubClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(config, token)
  }

  pub fn with_token(config: &Config, token: String) -> Result<Self> {
    let api_url = Url::parse(&config.github.api_url)
      .map_err(|e| eyre!("Invalid GitHub API url {}: {}", config.github.api_url, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(
      ACCEPT,
      HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
      "X-GitHub-Api-Version",
      HeaderValue::from_static("2022-11-28"),
    );

    let http = reqwest::Client::builder()
      .user_agent("hubox")
      .default_headers(headers)
      .timeout(Duration::from_secs(config.github.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create GitHub client: {}", e))?;

    Ok(Self {
      http,
      api_url: api_url.as_str().trim_end_matches('/').to_string(),
      token,
    })
  }

  fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
    self
      .http
      .request(method, format!("{}{}", self.api_url, path))
      .bearer_auth(&self.token)
  }

  /// GET `path` (relative to the API root) and return the body text.
  pub async fn get_text(&self, path: &str) -> Result<String> {
    debug!(path, "GET");

    let response = self
      .request(Method::GET, path)
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("GET {} returned {}", path, status));
    }

    response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", path, e))
  }

  /// Minimal request confirming the token can read notifications.
  pub async fn validate_token(&self) -> Result<()> {
    let response = self
      .request(Method::GET, "/notifications?all=true&per_page=1")
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach GitHub: {}", e))?;

    let status = response.status();
    if status.is_success() {
      Ok(())
    } else {
      Err(eyre!("Invalid token: {}", status))
    }
  }

  /// Mark a notification thread as handled on GitHub.
  pub async fn mark_thread_done(&self, thread_id: u64) -> Result<()> {
    let path = format!("/notifications/threads/{}", thread_id);

    let response = self
      .request(Method::PATCH, &path)
      .send()
      .await
      .map_err(|e| eyre!("Failed to mark thread {} as done: {}", thread_id, e))?;

    let status = response.status();
    // GitHub answers 205 Reset Content on success
    if status.is_success() {
      Ok(())
    } else {
      Err(eyre!("Failed to mark thread {} as done: {}", thread_id, status))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_trailing_slash_is_trimmed() {
    let mut config = Config::default();
    config.github.api_url = "https://github.example.com/api/v3/".to_string();

    let client = GitHubClient::with_token(&config, "t".to_string()).unwrap();
    assert_eq!(client.api_url, "https://github.example.com/api/v3");
  }

  #[test]
  fn test_invalid_api_url_is_rejected() {
    let mut config = Config::default();
    config.github.api_url = "not a url".to_string();

    assert!(GitHubClient::with_token(&config, "t".to_string()).is_err());
  }
}
