//! In-memory cache store.
//!
//! Backs deployments that run without a database file, and doubles as the
//! test store. A batch is applied under one write lock, so readers see the
//! whole generation swap at once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use serde_json::Value;

use crate::error::StoreError;

use super::{CacheStore, RecordKind, TimelineEntry, WriteBatch, WriteOp};

#[derive(Debug, Default, Clone, PartialEq)]
struct Inner {
  records: BTreeMap<(RecordKind, String), Value>,
  sets: BTreeMap<String, BTreeSet<String>>,
  timelines: BTreeMap<String, Vec<TimelineEntry>>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
    self
      .inner
      .read()
      .map_err(|e| StoreError(format!("lock poisoned: {}", e)))
  }
}

impl CacheStore for MemoryStore {
  fn get_record(&self, kind: RecordKind, key: &str) -> Result<Option<Value>, StoreError> {
    Ok(self.read()?.records.get(&(kind, key.to_string())).cloned())
  }

  fn record_keys(&self, kind: RecordKind, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let inner = self.read()?;
    Ok(
      inner
        .records
        .keys()
        .filter(|(k, key)| *k == kind && prefix.map_or(true, |p| key.starts_with(p)))
        .map(|(_, key)| key.clone())
        .collect(),
    )
  }

  fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
    Ok(
      self
        .read()?
        .sets
        .get(set)
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default(),
    )
  }

  fn timeline_range(
    &self,
    timeline: &str,
    min: i64,
    max: i64,
  ) -> Result<Vec<TimelineEntry>, StoreError> {
    Ok(
      self
        .read()?
        .timelines
        .get(timeline)
        .map(|entries| {
          entries
            .iter()
            .filter(|e| min <= e.score && e.score <= max)
            .cloned()
            .collect()
        })
        .unwrap_or_default(),
    )
  }

  fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
    let mut inner = self
      .inner
      .write()
      .map_err(|e| StoreError(format!("lock poisoned: {}", e)))?;

    for op in batch.ops {
      match op {
        WriteOp::PutRecord { kind, key, data } => {
          inner.records.insert((kind, key), data);
        }
        WriteOp::DeleteRecord { kind, key } => {
          inner.records.remove(&(kind, key));
        }
        WriteOp::ReplaceSet { set, members } => {
          inner.sets.insert(set, members.into_iter().collect());
        }
        WriteOp::DeleteSet { set } => {
          inner.sets.remove(&set);
        }
        WriteOp::RemoveFromSet { set, member } => {
          let emptied = match inner.sets.get_mut(&set) {
            Some(members) => {
              members.remove(&member);
              members.is_empty()
            }
            None => false,
          };
          if emptied {
            inner.sets.remove(&set);
          }
        }
        WriteOp::ReplaceTimeline { timeline, entries } => {
          inner.timelines.insert(timeline, entries);
        }
        WriteOp::DeleteTimeline { timeline } => {
          inner.timelines.remove(&timeline);
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
impl MemoryStore {
  /// Clone of the full contents, for idempotence comparisons in tests.
  pub(crate) fn dump(&self) -> impl PartialEq + std::fmt::Debug {
    self.inner.read().unwrap().clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn replace_timeline_swaps_wholesale() {
    let s = MemoryStore::new();
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::ReplaceTimeline {
      timeline: "t".to_string(),
      entries: vec![TimelineEntry {
        member: "a".to_string(),
        score: 10,
      }],
    });
    s.apply(batch).unwrap();

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::ReplaceTimeline {
      timeline: "t".to_string(),
      entries: vec![TimelineEntry {
        member: "b".to_string(),
        score: 20,
      }],
    });
    s.apply(batch).unwrap();

    let entries = s.timeline_range("t", 0, 100).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].member, "b");
  }

  #[test]
  fn remove_from_set_drops_empty_sets() {
    let s = MemoryStore::new();
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::ReplaceSet {
      set: "members:3".to_string(),
      members: vec!["1".to_string()],
    });
    s.apply(batch).unwrap();

    let mut batch = WriteBatch::new();
    batch.push(WriteOp::RemoveFromSet {
      set: "members:3".to_string(),
      member: "1".to_string(),
    });
    s.apply(batch).unwrap();
    assert!(s.set_members("members:3").unwrap().is_empty());
  }

  #[test]
  fn record_keys_sorted_with_prefix() {
    let s = MemoryStore::new();
    let mut batch = WriteBatch::new();
    for key in ["2:x", "1:y", "1:a"] {
      batch.push(WriteOp::PutRecord {
        kind: RecordKind::Commit,
        key: key.to_string(),
        data: json!({}),
      });
    }
    s.apply(batch).unwrap();
    assert_eq!(
      s.record_keys(RecordKind::Commit, Some("1:")).unwrap(),
      vec!["1:a", "1:y"]
    );
  }
}
