//! Wire types for the remote source API.
//!
//! The source speaks JSON with RFC 3339 timestamps; everything is converted
//! to epoch milliseconds on the way in.

use chrono::DateTime;
use serde::Deserialize;

use crate::error::SourceError;
use crate::types::{
  Branch, Commit, CommitStats, Group, Owner, OwnerKind, Project, User, Visibility,
};

/// Parse an RFC 3339 timestamp into epoch milliseconds.
pub fn epoch_ms(raw: &str) -> Result<i64, SourceError> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.timestamp_millis())
    .map_err(|e| SourceError::Decode(format!("bad timestamp '{}': {}", raw, e)))
}

#[derive(Debug, Deserialize)]
pub struct ApiOwnerRef {
  pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiNamespace {
  pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiProject {
  pub id: u64,
  pub name: String,
  pub http_url_to_repo: String,
  pub default_branch: Option<String>,
  /// Present when a user owns the project; group-owned projects carry
  /// only a namespace.
  pub owner: Option<ApiOwnerRef>,
  pub namespace: Option<ApiNamespace>,
  #[serde(default)]
  pub tag_list: Vec<String>,
  #[serde(default)]
  pub public: bool,
  pub visibility_level: Option<u8>,
  pub created_at: String,
  pub last_activity_at: Option<String>,
}

impl ApiProject {
  pub fn into_project(self) -> Result<Project, SourceError> {
    let owner = match (&self.owner, &self.namespace) {
      (Some(user), _) => Owner {
        kind: OwnerKind::User,
        id: user.id,
      },
      (None, Some(ns)) => Owner {
        kind: OwnerKind::Group,
        id: ns.id,
      },
      (None, None) => {
        return Err(SourceError::Decode(format!(
          "project {} has neither owner nor namespace",
          self.id
        )))
      }
    };

    let visibility = match self.visibility_level {
      Some(level) if level >= 20 => Visibility::Public,
      Some(level) if level >= 10 => Visibility::Internal,
      Some(_) => Visibility::Private,
      None if self.public => Visibility::Public,
      None => Visibility::Private,
    };

    Ok(Project {
      id: self.id,
      name: self.name,
      url: self.http_url_to_repo,
      default_branch: self.default_branch,
      owner,
      tags: self.tag_list,
      visibility,
      created_at: epoch_ms(&self.created_at)?,
      last_activity_at: self
        .last_activity_at
        .as_deref()
        .map(epoch_ms)
        .transpose()?,
      first_commit_at: None,
      last_commit_at: None,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiBranchCommit {
  pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiBranch {
  pub name: String,
  #[serde(default)]
  pub protected: bool,
  pub commit: Option<ApiBranchCommit>,
}

impl ApiBranch {
  pub fn into_branch(self, project_id: u64) -> Branch {
    Branch {
      project_id,
      name: self.name,
      protected: self.protected,
      last_commit_sha: self.commit.map(|c| c.id),
      created_at: None,
      last_commit_at: None,
      contributors: Vec::new(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiCommitStats {
  #[serde(default)]
  pub additions: u64,
  #[serde(default)]
  pub deletions: u64,
  pub files_changed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommit {
  pub id: String,
  pub author_email: String,
  pub author_name: String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  pub created_at: String,
  pub stats: Option<ApiCommitStats>,
}

impl ApiCommit {
  pub fn into_commit(self, project_id: u64) -> Result<Commit, SourceError> {
    let created_at = epoch_ms(&self.created_at)?;
    let message = match (self.message, &self.title) {
      (Some(m), _) => m,
      (None, Some(t)) => format!("{}\n", t),
      (None, None) => String::new(),
    };
    Ok(Commit {
      project_id,
      sha: self.id,
      author_email: self.author_email,
      author_name: self.author_name,
      message,
      created_at,
      stats: self.stats.map(|s| CommitStats {
        lines_added: s.additions,
        lines_removed: s.deletions,
        files_changed: s.files_changed,
      }),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: u64,
  pub name: String,
  pub username: String,
  pub email: Option<String>,
  pub created_at: String,
  #[serde(default)]
  pub external: bool,
}

impl ApiUser {
  pub fn into_user(self) -> Result<User, SourceError> {
    let created_at = epoch_ms(&self.created_at)?;
    Ok(User {
      id: self.id,
      name: self.name,
      username: self.username,
      emails: self.email.into_iter().collect(),
      created_at,
      external: self.external,
      first_commit_at: None,
      last_commit_at: None,
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiEmail {
  pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiGroup {
  pub id: u64,
  pub name: String,
}

impl ApiGroup {
  pub fn into_group(self) -> Group {
    Group {
      id: self.id,
      name: self.name,
      members: Vec::new(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMember {
  pub id: u64,
}
