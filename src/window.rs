//! Inclusive time windows over commit timestamps.

use chrono::Utc;

use crate::error::QueryError;

/// An inclusive `[start, end]` epoch-millisecond range.
///
/// `start` defaults to 0 and `end` to "now" when omitted; a window with
/// `start > end` is rejected before any I/O happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
  pub start: i64,
  pub end: i64,
}

impl TimeWindow {
  pub fn new(start: i64, end: i64) -> Result<Self, QueryError> {
    if start > end {
      return Err(QueryError::Validation(format!(
        "start_time {} is after end_time {}",
        start, end
      )));
    }
    Ok(TimeWindow { start, end })
  }

  /// Build a window from optional request parameters.
  pub fn from_params(start: Option<i64>, end: Option<i64>) -> Result<Self, QueryError> {
    let start = start.unwrap_or(0);
    let end = end.unwrap_or_else(now_ms);
    Self::new(start, end)
  }

  /// Everything up to now.
  pub fn all() -> Self {
    TimeWindow {
      start: 0,
      end: now_ms(),
    }
  }

  pub fn contains(&self, ts: i64) -> bool {
    self.start <= ts && ts <= self.end
  }
}

pub fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_in() {
    let w = TimeWindow::from_params(None, None).unwrap();
    assert_eq!(w.start, 0);
    assert!(w.end > 0);

    let w = TimeWindow::from_params(Some(100), Some(200)).unwrap();
    assert!(w.contains(100));
    assert!(w.contains(200));
    assert!(!w.contains(201));
  }

  #[test]
  fn inverted_window_is_invalid() {
    let err = TimeWindow::from_params(Some(300), Some(100)).unwrap_err();
    assert!(err.is_validation());
  }
}
