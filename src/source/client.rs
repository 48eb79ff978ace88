//! Remote source API client.
//!
//! One method per entity collection. Paged calls return a single finite
//! page; callers loop until an empty page comes back. The source itself has
//! no retry or backoff, so the HTTP implementation adds bounded retries
//! with exponential backoff and a per-call deadline.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;
use url::Url;

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::types::{Branch, Commit, Group, Project, User};

use super::api_types::{ApiBranch, ApiCommit, ApiEmail, ApiGroup, ApiMember, ApiProject, ApiUser};

/// Page size used when a method paginates internally.
pub const PAGE_SIZE: u32 = 100;

const MAX_ATTEMPTS: u32 = 3;
const CALL_DEADLINE: Duration = Duration::from_secs(30);

/// Read access to the remote source API.
#[async_trait]
pub trait SourceClient: Send + Sync {
  async fn list_projects(&self) -> Result<Vec<Project>, SourceError>;
  async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>, SourceError>;
  async fn list_commits(
    &self,
    project_id: u64,
    branch: &str,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<Commit>, SourceError>;
  async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<User>, SourceError>;
  async fn list_user_emails(&self, user_id: u64) -> Result<Vec<String>, SourceError>;
  async fn list_groups(&self) -> Result<Vec<Group>, SourceError>;
  async fn list_group_members(&self, group_id: u64) -> Result<Vec<u64>, SourceError>;
}

/// Delay before retry attempt `attempt` (0-based): 500ms, 1s, 2s, ...
fn backoff_delay(attempt: u32) -> Duration {
  Duration::from_millis(500u64.saturating_mul(1 << attempt))
}

/// HTTP implementation of [`SourceClient`].
#[derive(Clone)]
pub struct HttpSourceClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpSourceClient {
  pub fn new(config: &SourceConfig, token: Option<String>) -> Result<Self, SourceError> {
    let base = Url::parse(&config.url)
      .map_err(|e| SourceError::Decode(format!("bad source url {}: {}", config.url, e)))?;

    let http = reqwest::Client::builder()
      .timeout(CALL_DEADLINE)
      .build()
      .map_err(|e| SourceError::Unavailable(format!("failed to build http client: {}", e)))?;

    Ok(Self { http, base, token })
  }

  /// GET a JSON payload with bounded retries and a per-call deadline.
  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, SourceError> {
    let mut url = self
      .base
      .join(path)
      .map_err(|e| SourceError::Decode(format!("bad endpoint {}: {}", path, e)))?;
    for (k, v) in query {
      url.query_pairs_mut().append_pair(k, v);
    }

    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
      if attempt > 0 {
        tokio::time::sleep(backoff_delay(attempt - 1)).await;
      }

      let mut request = self.http.get(url.clone());
      if let Some(token) = &self.token {
        request = request.header("PRIVATE-TOKEN", token.clone());
      }

      let response = match tokio::time::timeout(CALL_DEADLINE, request.send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
          warn!(%url, attempt, error = %e, "source request failed");
          last_err = Some(SourceError::Unavailable(e.to_string()));
          continue;
        }
        Err(_) => {
          warn!(%url, attempt, "source request timed out");
          last_err = Some(SourceError::Unavailable("deadline exceeded".to_string()));
          continue;
        }
      };

      let status = response.status();
      if status.is_server_error() {
        warn!(%url, attempt, %status, "source returned server error");
        last_err = Some(SourceError::Unavailable(format!("status {}", status)));
        continue;
      }
      if !status.is_success() {
        // Client errors are not retriable.
        return Err(SourceError::Unavailable(format!("status {}", status)));
      }

      return response
        .json::<T>()
        .await
        .map_err(|e| SourceError::Decode(e.to_string()));
    }

    Err(last_err.unwrap_or_else(|| SourceError::Unavailable("no attempts made".to_string())))
  }

  /// Drain a paginated collection by looping until an empty page.
  async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SourceError> {
    let mut all = Vec::new();
    let mut page = 1u32;
    loop {
      let batch: Vec<T> = self
        .get_json(
          path,
          &[
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
          ],
        )
        .await?;
      if batch.is_empty() {
        break;
      }
      all.extend(batch);
      page += 1;
    }
    Ok(all)
  }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
  async fn list_projects(&self) -> Result<Vec<Project>, SourceError> {
    let raw: Vec<ApiProject> = self.get_all_pages("projects/all").await?;
    raw.into_iter().map(|p| p.into_project()).collect()
  }

  async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>, SourceError> {
    let raw: Vec<ApiBranch> = self
      .get_all_pages(&format!("projects/{}/repository/branches", project_id))
      .await?;
    Ok(raw.into_iter().map(|b| b.into_branch(project_id)).collect())
  }

  async fn list_commits(
    &self,
    project_id: u64,
    branch: &str,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<Commit>, SourceError> {
    let raw: Vec<ApiCommit> = self
      .get_json(
        &format!("projects/{}/repository/commits", project_id),
        &[
          ("ref_name", branch.to_string()),
          ("page", page.to_string()),
          ("per_page", per_page.to_string()),
        ],
      )
      .await?;
    raw.into_iter().map(|c| c.into_commit(project_id)).collect()
  }

  async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<User>, SourceError> {
    let raw: Vec<ApiUser> = self
      .get_json(
        "users",
        &[
          ("page", page.to_string()),
          ("per_page", per_page.to_string()),
        ],
      )
      .await?;
    raw.into_iter().map(|u| u.into_user()).collect()
  }

  async fn list_user_emails(&self, user_id: u64) -> Result<Vec<String>, SourceError> {
    let raw: Vec<ApiEmail> = self
      .get_json(&format!("users/{}/emails", user_id), &[])
      .await?;
    Ok(raw.into_iter().map(|e| e.email).collect())
  }

  async fn list_groups(&self) -> Result<Vec<Group>, SourceError> {
    let raw: Vec<ApiGroup> = self.get_all_pages("groups").await?;
    Ok(raw.into_iter().map(|g| g.into_group()).collect())
  }

  async fn list_group_members(&self, group_id: u64) -> Result<Vec<u64>, SourceError> {
    let raw: Vec<ApiMember> = self
      .get_all_pages(&format!("groups/{}/members", group_id))
      .await?;
    Ok(raw.into_iter().map(|m| m.id).collect())
  }
}

/// Fetch every commit of one branch by looping pages until empty.
pub async fn drain_commits<C: SourceClient + ?Sized>(
  source: &C,
  project_id: u64,
  branch: &str,
) -> Result<Vec<Commit>, SourceError> {
  let mut all = Vec::new();
  let mut page = 1u32;
  loop {
    let batch = source
      .list_commits(project_id, branch, page, PAGE_SIZE)
      .await?;
    if batch.is_empty() {
      break;
    }
    all.extend(batch);
    page += 1;
  }
  Ok(all)
}

/// Fetch every registered user by looping pages until empty.
pub async fn drain_users<C: SourceClient + ?Sized>(source: &C) -> Result<Vec<User>, SourceError> {
  let mut all = Vec::new();
  let mut page = 1u32;
  loop {
    let batch = source.list_users(page, PAGE_SIZE).await?;
    if batch.is_empty() {
      break;
    }
    all.extend(batch);
    page += 1;
  }
  Ok(all)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn backoff_doubles() {
    assert_eq!(backoff_delay(0), Duration::from_millis(500));
    assert_eq!(backoff_delay(1), Duration::from_millis(1000));
    assert_eq!(backoff_delay(2), Duration::from_millis(2000));
  }
}
