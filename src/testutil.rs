//! Shared test fixtures: an in-memory scripted source.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::source::SourceClient;
use crate::types::{
  Branch, Commit, Group, Owner, OwnerKind, Project, User, Visibility,
};

/// Scripted [`SourceClient`] with the same page semantics as the real
/// API: page numbers start at 1, an empty page ends pagination.
#[derive(Debug, Default, Clone)]
pub struct StubSource {
  pub projects: Vec<Project>,
  pub branches: HashMap<u64, Vec<Branch>>,
  pub commits: HashMap<(u64, String), Vec<Commit>>,
  pub users: Vec<User>,
  pub emails: HashMap<u64, Vec<String>>,
  pub groups: Vec<Group>,
  pub members: HashMap<u64, Vec<u64>>,
  pub fail_commits: bool,
  pub fail_users: bool,
}

fn page_of<T: Clone>(items: &[T], page: u32, per_page: u32) -> Vec<T> {
  let start = ((page.max(1) - 1) as usize).saturating_mul(per_page as usize);
  if start >= items.len() {
    return Vec::new();
  }
  let end = (start + per_page as usize).min(items.len());
  items[start..end].to_vec()
}

#[async_trait]
impl SourceClient for StubSource {
  async fn list_projects(&self) -> Result<Vec<Project>, SourceError> {
    Ok(self.projects.clone())
  }

  async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>, SourceError> {
    Ok(self.branches.get(&project_id).cloned().unwrap_or_default())
  }

  async fn list_commits(
    &self,
    project_id: u64,
    branch: &str,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<Commit>, SourceError> {
    if self.fail_commits {
      return Err(SourceError::Unavailable("scripted failure".to_string()));
    }
    let commits = self
      .commits
      .get(&(project_id, branch.to_string()))
      .cloned()
      .unwrap_or_default();
    Ok(page_of(&commits, page, per_page))
  }

  async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<User>, SourceError> {
    if self.fail_users {
      return Err(SourceError::Unavailable("scripted failure".to_string()));
    }
    Ok(page_of(&self.users, page, per_page))
  }

  async fn list_user_emails(&self, user_id: u64) -> Result<Vec<String>, SourceError> {
    Ok(self.emails.get(&user_id).cloned().unwrap_or_default())
  }

  async fn list_groups(&self) -> Result<Vec<Group>, SourceError> {
    Ok(self.groups.clone())
  }

  async fn list_group_members(&self, group_id: u64) -> Result<Vec<u64>, SourceError> {
    Ok(self.members.get(&group_id).cloned().unwrap_or_default())
  }
}

pub fn project(id: u64, name: &str, default_branch: &str) -> Project {
  Project {
    id,
    name: name.to_string(),
    url: format!("https://forge.example.org/{}", name),
    default_branch: Some(default_branch.to_string()),
    owner: Owner {
      kind: OwnerKind::User,
      id: 7,
    },
    tags: Vec::new(),
    visibility: Visibility::Internal,
    created_at: 0,
    last_activity_at: None,
    first_commit_at: None,
    last_commit_at: None,
  }
}

pub fn branch(project_id: u64, name: &str) -> Branch {
  Branch {
    project_id,
    name: name.to_string(),
    protected: false,
    last_commit_sha: None,
    created_at: None,
    last_commit_at: None,
    contributors: Vec::new(),
  }
}

pub fn commit(project_id: u64, sha: &str, author_email: &str, created_at: i64) -> Commit {
  Commit {
    project_id,
    sha: sha.to_string(),
    author_email: author_email.to_string(),
    author_name: author_email.split('@').next().unwrap_or("dev").to_string(),
    message: format!("commit {}", sha),
    created_at,
    stats: None,
  }
}

pub fn user(id: u64, email: &str) -> User {
  let username = email.split('@').next().unwrap_or("dev").to_string();
  User {
    id,
    name: username.clone(),
    username,
    emails: vec![email.to_string()],
    created_at: 0,
    external: false,
    first_commit_at: None,
    last_commit_at: None,
  }
}

pub fn group(id: u64, name: &str) -> Group {
  Group {
    id,
    name: name.to_string(),
    members: Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paging_terminates_with_empty_page() {
    let items: Vec<u32> = (0..5).collect();
    assert_eq!(page_of(&items, 1, 2), vec![0, 1]);
    assert_eq!(page_of(&items, 3, 2), vec![4]);
    assert!(page_of(&items, 4, 2).is_empty());
  }
}
