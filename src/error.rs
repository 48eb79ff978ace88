//! Error taxonomy shared across the mirror.
//!
//! Callers (the HTTP route layer) need to tell apart "nothing found",
//! "bad request", and "the remote source is down" — none of these may
//! collapse into an empty result.

use thiserror::Error;

/// Failure talking to the remote source API.
///
/// `Unavailable` is a distinguishable signal, never conflated with an
/// empty collection.
#[derive(Debug, Error)]
pub enum SourceError {
  /// Network failure, timeout, or a non-success HTTP status.
  #[error("source unreachable: {0}")]
  Unavailable(String),

  /// The source answered but the payload did not parse.
  #[error("unexpected payload from source: {0}")]
  Decode(String),
}

/// Failure inside the cache store backend.
#[derive(Debug, Error)]
#[error("cache store error: {0}")]
pub struct StoreError(pub String);

impl From<rusqlite::Error> for StoreError {
  fn from(e: rusqlite::Error) -> Self {
    StoreError(e.to_string())
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(e: serde_json::Error) -> Self {
    StoreError(e.to_string())
  }
}

/// Outcome sentinels for query operations.
///
/// The route layer maps these to status codes: NotFound → 404,
/// Validation → 400, SourceUnavailable → 503, Store → 500.
#[derive(Debug, Error)]
pub enum QueryError {
  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("invalid request: {0}")]
  Validation(String),

  #[error("source unavailable: {0}")]
  SourceUnavailable(#[from] SourceError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl QueryError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, QueryError::NotFound(_))
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, QueryError::Validation(_))
  }
}
