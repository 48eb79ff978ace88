//! Domain entities mirrored from the remote source.
//!
//! All timestamps are epoch milliseconds. Derived fields (first/last commit
//! dates, contributor lists) are filled in by reconciliation or joined from
//! secondary indexes at read time; they default to empty when absent.

use serde::{Deserialize, Serialize};

/// Owner of a project: either a registered user or a group.
///
/// Stored as a structured sub-field of the project record, never as an
/// encoded "kind:id" string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
  pub kind: OwnerKind,
  pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
  User,
  Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  Private,
  Internal,
  Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: u64,
  pub name: String,
  pub url: String,
  pub default_branch: Option<String>,
  pub owner: Owner,
  #[serde(default)]
  pub tags: Vec<String>,
  pub visibility: Visibility,
  pub created_at: i64,
  #[serde(default)]
  pub last_activity_at: Option<i64>,
  /// Derived from the project commit timeline.
  #[serde(default)]
  pub first_commit_at: Option<i64>,
  #[serde(default)]
  pub last_commit_at: Option<i64>,
}

/// Branch of a project. Identity is the (project id, name) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
  pub project_id: u64,
  pub name: String,
  pub protected: bool,
  pub last_commit_sha: Option<String>,
  /// Derived: timestamp of the first commit on this branch.
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub last_commit_at: Option<i64>,
  /// Derived: resolved identities seen among this branch's commits.
  /// Joined from the contributor set at read time; empty in storage.
  #[serde(default)]
  pub contributors: Vec<Contributor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
  pub lines_added: u64,
  pub lines_removed: u64,
  /// Not every stats payload carries a file count; absent is not zero.
  pub files_changed: Option<u64>,
}

/// A commit. Identity is the (project id, sha) pair and is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
  pub project_id: u64,
  pub sha: String,
  pub author_email: String,
  pub author_name: String,
  pub message: String,
  pub created_at: i64,
  #[serde(default)]
  pub stats: Option<CommitStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub name: String,
  pub username: String,
  /// Declared email plus any secondary emails from the source.
  #[serde(default)]
  pub emails: Vec<String>,
  pub created_at: i64,
  /// Author identity seen only in commits, never registered in the
  /// source's user directory.
  #[serde(default)]
  pub external: bool,
  #[serde(default)]
  pub first_commit_at: Option<i64>,
  #[serde(default)]
  pub last_commit_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
  pub id: u64,
  pub name: String,
  /// Joined from the membership set at read time; empty in storage.
  #[serde(default)]
  pub members: Vec<u64>,
}

/// Merge request stub. The source left these unimplemented; queries
/// return the not-found sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
  pub id: u64,
  pub project_id: u64,
  pub state: MergeState,
  pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeState {
  Opened,
  Closed,
  Merged,
  All,
}

impl MergeState {
  /// Parse the `state` query parameter; anything else is a validation
  /// error in the caller.
  pub fn from_param(s: &str) -> Option<Self> {
    match s {
      "opened" => Some(MergeState::Opened),
      "closed" => Some(MergeState::Closed),
      "merged" => Some(MergeState::Merged),
      "all" => Some(MergeState::All),
      _ => None,
    }
  }
}

/// Relation between a user/group and a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
  Owner,
  Contributor,
}

impl Relation {
  pub fn from_param(s: &str) -> Option<Self> {
    match s {
      "owner" => Some(Relation::Owner),
      "contributor" => Some(Relation::Contributor),
      _ => None,
    }
  }
}

/// A resolved commit author identity: a registered user, or an external
/// contributor known only by email.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contributor {
  User { id: u64 },
  External { email: String },
}

impl Contributor {
  /// Stable string form used as a relation-set member.
  pub fn to_member(&self) -> String {
    match self {
      Contributor::User { id } => format!("user:{}", id),
      Contributor::External { email } => format!("email:{}", email),
    }
  }

  /// Parse the relation-set member form written by `to_member`.
  pub fn from_member(s: &str) -> Option<Self> {
    let (tag, rest) = s.split_once(':')?;
    match tag {
      "user" => rest.parse().ok().map(|id| Contributor::User { id }),
      "email" => Some(Contributor::External {
        email: rest.to_string(),
      }),
      _ => None,
    }
  }

  pub fn user_id(&self) -> Option<u64> {
    match self {
      Contributor::User { id } => Some(*id),
      Contributor::External { .. } => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contributor_member_roundtrip() {
    let u = Contributor::User { id: 42 };
    let e = Contributor::External {
      email: "dev@example.org".to_string(),
    };
    assert_eq!(Contributor::from_member(&u.to_member()), Some(u));
    assert_eq!(Contributor::from_member(&e.to_member()), Some(e));
    assert_eq!(Contributor::from_member("bogus"), None);
  }

  #[test]
  fn owner_serializes_as_tagged_pair() {
    let owner = Owner {
      kind: OwnerKind::Group,
      id: 7,
    };
    let json = serde_json::to_value(&owner).unwrap();
    assert_eq!(json["kind"], "group");
    assert_eq!(json["id"], 7);
  }

  #[test]
  fn merge_state_param_validation() {
    assert_eq!(MergeState::from_param("opened"), Some(MergeState::Opened));
    assert_eq!(MergeState::from_param("bogus"), None);
    assert_eq!(Relation::from_param("owner"), Some(Relation::Owner));
    assert_eq!(Relation::from_param("member"), None);
  }
}
