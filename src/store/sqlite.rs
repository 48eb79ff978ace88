//! Sqlite-backed cache store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde_json::Value;

use crate::error::StoreError;

use super::schema::SCHEMA;
use super::{CacheStore, RecordKind, TimelineEntry, WriteBatch, WriteOp};

pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("forge-mirror").join("mirror.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError(format!("lock poisoned: {}", e)))
  }
}

impl CacheStore for SqliteStore {
  fn get_record(&self, kind: RecordKind, key: &str) -> Result<Option<Value>, StoreError> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare_cached("SELECT data FROM records WHERE kind = ? AND key = ?")?;

    let data: Option<Vec<u8>> = stmt
      .query_row(params![kind.as_str(), key], |row| row.get(0))
      .map(Some)
      .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
      })?;

    match data {
      Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      None => Ok(None),
    }
  }

  fn record_keys(&self, kind: RecordKind, prefix: Option<&str>) -> Result<Vec<String>, StoreError> {
    let conn = self.lock()?;
    let mut collect = |stmt: &mut rusqlite::Statement<'_>,
                       params: &[&dyn rusqlite::ToSql]|
     -> Result<Vec<String>, StoreError> {
      let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
      let mut keys = Vec::new();
      for row in rows {
        keys.push(row?);
      }
      Ok(keys)
    };

    match prefix {
      Some(prefix) => {
        let mut stmt = conn.prepare_cached(
          "SELECT key FROM records WHERE kind = ? AND key LIKE ? || '%' ORDER BY key",
        )?;
        collect(&mut stmt, &[&kind.as_str(), &prefix])
      }
      None => {
        let mut stmt = conn.prepare_cached("SELECT key FROM records WHERE kind = ? ORDER BY key")?;
        collect(&mut stmt, &[&kind.as_str()])
      }
    }
  }

  fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare_cached("SELECT member FROM relation_sets WHERE name = ? ORDER BY member")?;
    let rows = stmt.query_map(params![set], |row| row.get::<_, String>(0))?;
    let mut members = Vec::new();
    for row in rows {
      members.push(row?);
    }
    Ok(members)
  }

  fn timeline_range(
    &self,
    timeline: &str,
    min: i64,
    max: i64,
  ) -> Result<Vec<TimelineEntry>, StoreError> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare_cached(
      "SELECT member, score FROM timelines
       WHERE name = ? AND score >= ? AND score <= ?
       ORDER BY score, seq",
    )?;
    let rows = stmt.query_map(params![timeline, min, max], |row| {
      Ok(TimelineEntry {
        member: row.get(0)?,
        score: row.get(1)?,
      })
    })?;
    let mut entries = Vec::new();
    for row in rows {
      entries.push(row?);
    }
    Ok(entries)
  }

  fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;

    for op in batch.ops {
      match op {
        WriteOp::PutRecord { kind, key, data } => {
          let bytes = serde_json::to_vec(&data)?;
          tx.execute(
            "INSERT OR REPLACE INTO records (kind, key, data) VALUES (?, ?, ?)",
            params![kind.as_str(), key, bytes],
          )?;
        }
        WriteOp::DeleteRecord { kind, key } => {
          tx.execute(
            "DELETE FROM records WHERE kind = ? AND key = ?",
            params![kind.as_str(), key],
          )?;
        }
        WriteOp::ReplaceSet { set, members } => {
          tx.execute("DELETE FROM relation_sets WHERE name = ?", params![set])?;
          for member in members {
            tx.execute(
              "INSERT OR REPLACE INTO relation_sets (name, member) VALUES (?, ?)",
              params![set, member],
            )?;
          }
        }
        WriteOp::DeleteSet { set } => {
          tx.execute("DELETE FROM relation_sets WHERE name = ?", params![set])?;
        }
        WriteOp::RemoveFromSet { set, member } => {
          tx.execute(
            "DELETE FROM relation_sets WHERE name = ? AND member = ?",
            params![set, member],
          )?;
        }
        WriteOp::ReplaceTimeline { timeline, entries } => {
          tx.execute("DELETE FROM timelines WHERE name = ?", params![timeline])?;
          for (seq, entry) in entries.into_iter().enumerate() {
            tx.execute(
              "INSERT OR REPLACE INTO timelines (name, member, score, seq) VALUES (?, ?, ?, ?)",
              params![timeline, entry.member, entry.score, seq as i64],
            )?;
          }
        }
        WriteOp::DeleteTimeline { timeline } => {
          tx.execute("DELETE FROM timelines WHERE name = ?", params![timeline])?;
        }
      }
    }

    tx.commit()?;
    Ok(())
  }
}
