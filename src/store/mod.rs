//! Cache store: hash records, set-valued relations, and scored timelines.
//!
//! Records are JSON blobs addressed by `(kind, key)`; relation sets hold
//! plain string members; timelines are ordered indexes scored by commit
//! timestamp with insertion order breaking ties. All mutation goes through
//! [`CacheStore::apply`], which publishes a whole [`WriteBatch`] atomically
//! so concurrent readers never observe cross-index inconsistency.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Entity kinds stored as primary records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
  Project,
  Branch,
  Commit,
  User,
  Group,
  /// Inverted email → user-id index maintained by reconciliation.
  EmailOwner,
}

impl RecordKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      RecordKind::Project => "project",
      RecordKind::Branch => "branch",
      RecordKind::Commit => "commit",
      RecordKind::User => "user",
      RecordKind::Group => "group",
      RecordKind::EmailOwner => "email_owner",
    }
  }
}

/// One member of a timeline with its score (epoch-ms commit timestamp).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
  pub member: String,
  pub score: i64,
}

/// A single store mutation. Batches of these are applied atomically.
#[derive(Debug, Clone)]
pub enum WriteOp {
  PutRecord {
    kind: RecordKind,
    key: String,
    data: Value,
  },
  DeleteRecord {
    kind: RecordKind,
    key: String,
  },
  /// Replace a relation set wholesale with the given members.
  ReplaceSet {
    set: String,
    members: Vec<String>,
  },
  DeleteSet {
    set: String,
  },
  RemoveFromSet {
    set: String,
    member: String,
  },
  /// Replace a timeline wholesale; entries must already be in ascending
  /// score order (ties keep the given order).
  ReplaceTimeline {
    timeline: String,
    entries: Vec<TimelineEntry>,
  },
  DeleteTimeline {
    timeline: String,
  },
}

/// An atomically applied group of mutations.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
  pub ops: Vec<WriteOp>,
}

impl WriteBatch {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, op: WriteOp) {
    self.ops.push(op);
  }

  pub fn put<T: Serialize>(
    &mut self,
    kind: RecordKind,
    key: impl Into<String>,
    value: &T,
  ) -> Result<(), StoreError> {
    self.ops.push(WriteOp::PutRecord {
      kind,
      key: key.into(),
      data: serde_json::to_value(value)?,
    });
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    self.ops.is_empty()
  }
}

/// Storage backend contract.
///
/// Reads are lock-free beyond the backend's own snapshot boundary; writes
/// land only through [`CacheStore::apply`].
pub trait CacheStore: Send + Sync {
  fn get_record(&self, kind: RecordKind, key: &str) -> Result<Option<Value>, StoreError>;

  /// All record keys of a kind, sorted, optionally restricted to a prefix.
  fn record_keys(&self, kind: RecordKind, prefix: Option<&str>) -> Result<Vec<String>, StoreError>;

  /// Members of a relation set, sorted. Missing sets are empty.
  fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

  /// Timeline entries with `min <= score <= max`, ascending by score then
  /// insertion order.
  fn timeline_range(
    &self,
    timeline: &str,
    min: i64,
    max: i64,
  ) -> Result<Vec<TimelineEntry>, StoreError>;

  /// Apply a batch of mutations atomically.
  fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// Fetch and deserialize a record.
pub fn get_as<T: DeserializeOwned>(
  store: &impl CacheStore,
  kind: RecordKind,
  key: &str,
) -> Result<Option<T>, StoreError> {
  match store.get_record(kind, key)? {
    Some(value) => Ok(Some(serde_json::from_value(value)?)),
    None => Ok(None),
  }
}

// Key layout. Branch and commit records are scoped under their project;
// timelines and relation sets follow the same composite naming.

pub fn branch_key(project_id: u64, name: &str) -> String {
  format!("{}:{}", project_id, name)
}

pub fn commit_key(project_id: u64, sha: &str) -> String {
  format!("{}:{}", project_id, sha)
}

/// Prefix matching every branch or commit key of one project.
pub fn project_scope(project_id: u64) -> String {
  format!("{}:", project_id)
}

pub fn project_timeline(project_id: u64) -> String {
  format!("project:{}:commits", project_id)
}

pub fn branch_timeline(project_id: u64, name: &str) -> String {
  format!("project:{}:branches:{}:commits", project_id, name)
}

pub fn user_timeline(user_id: u64) -> String {
  format!("user:{}:commits", user_id)
}

pub fn emails_set(user_id: u64) -> String {
  format!("emails:{}", user_id)
}

pub fn members_set(group_id: u64) -> String {
  format!("members:{}", group_id)
}

pub fn project_contributors_set(project_id: u64) -> String {
  format!("contributors:{}", project_id)
}

pub fn branch_contributors_set(project_id: u64, name: &str) -> String {
  format!("contributors:{}:{}", project_id, name)
}

/// Split a `<project_id>:<rest>` composite key.
pub fn split_scoped_key(key: &str) -> Option<(u64, &str)> {
  let (pid, rest) = key.split_once(':')?;
  pid.parse().ok().map(|pid| (pid, rest))
}
