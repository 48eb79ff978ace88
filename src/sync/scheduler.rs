//! Fixed-interval scheduling of reconciliation cycles.
//!
//! One task owns the schedule: an immediate cycle at startup, then one per
//! interval, with a channel for event-triggered partial refreshes and a
//! watch for shutdown. A run lock keeps externally requested runs from
//! overlapping a scheduled one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info};

use crate::source::SourceClient;
use crate::store::CacheStore;

use super::reconciler::{CycleReport, EntityKind, Reconciler};

pub struct Scheduler<S, C> {
  reconciler: Arc<Reconciler<S, C>>,
  interval: Duration,
  run_lock: Arc<Mutex<()>>,
}

impl<S: CacheStore, C: SourceClient> Scheduler<S, C> {
  pub fn new(reconciler: Arc<Reconciler<S, C>>, interval: Duration) -> Self {
    Self {
      reconciler,
      interval,
      run_lock: Arc::new(Mutex::new(())),
    }
  }

  /// Run one cycle immediately unless another run holds the lock.
  /// Returns `None` when skipped.
  pub async fn run_now(&self, kinds: &[EntityKind]) -> Option<CycleReport> {
    let guard = self.run_lock.try_lock().ok()?;
    let report = self.reconciler.run_kinds(kinds).await;
    drop(guard);
    Some(report)
  }

  /// Drive the schedule until `shutdown` flips to true. `refresh` carries
  /// event-triggered requests for specific entity types.
  pub async fn run(
    &self,
    mut refresh: mpsc::Receiver<Vec<EntityKind>>,
    mut shutdown: watch::Receiver<bool>,
  ) {
    let mut ticker = tokio::time::interval(self.interval);
    // First tick fires immediately: populate the cache before serving.
    loop {
      tokio::select! {
        _ = ticker.tick() => {
          let _guard = self.run_lock.lock().await;
          let report = self.reconciler.run_cycle().await;
          if !report.fully_ok() {
            debug!("scheduled cycle completed with failed types");
          }
        }
        requested = refresh.recv() => {
          match requested {
            Some(kinds) => {
              let _guard = self.run_lock.lock().await;
              self.reconciler.run_kinds(&kinds).await;
            }
            None => break,
          }
        }
        _ = shutdown.changed() => {
          if *shutdown.borrow() {
            info!("scheduler shutting down");
            break;
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, RecordKind};
  use crate::testutil::{project, StubSource};

  #[tokio::test]
  async fn startup_cycle_populates_then_shutdown_stops() {
    let mut source = StubSource::default();
    source.projects = vec![project(1, "demo", "main")];

    let store = Arc::new(MemoryStore::new());
    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(source)));
    let scheduler = Arc::new(Scheduler::new(reconciler, Duration::from_secs(3600)));

    let (_refresh_tx, refresh_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.run(refresh_rx, shutdown_rx).await });

    // The immediate startup tick mirrors the project before any interval
    // elapses.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.record_keys(RecordKind::Project, None).unwrap(), vec!["1"]);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
  }

  #[tokio::test]
  async fn run_now_skips_while_a_run_is_in_flight() {
    let mut source = StubSource::default();
    source.projects = vec![project(1, "demo", "main")];

    let store = Arc::new(MemoryStore::new());
    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(source)));
    let scheduler = Scheduler::new(reconciler, Duration::from_secs(3600));

    // Another run holds the lock; the overlapping request is refused.
    let guard = scheduler.run_lock.lock().await;
    assert!(scheduler.run_now(&[EntityKind::Projects]).await.is_none());
    assert!(store
      .record_keys(RecordKind::Project, None)
      .unwrap()
      .is_empty());
    drop(guard);

    let report = scheduler.run_now(&[EntityKind::Projects]).await.unwrap();
    assert!(report.fully_ok());
    assert_eq!(store.record_keys(RecordKind::Project, None).unwrap(), vec!["1"]);
  }

  #[tokio::test]
  async fn refresh_request_runs_selected_kinds() {
    let mut source = StubSource::default();
    source.projects = vec![project(1, "demo", "main")];
    source.users = vec![crate::testutil::user(7, "e1@x.y")];

    let store = Arc::new(MemoryStore::new());
    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(source)));
    let scheduler = Scheduler::new(reconciler, Duration::from_secs(3600));

    let report = scheduler.run_now(&[EntityKind::Users]).await.unwrap();
    assert!(report.fully_ok());
    assert_eq!(store.record_keys(RecordKind::User, None).unwrap(), vec!["7"]);
    // Only the requested type ran.
    assert!(store
      .record_keys(RecordKind::Project, None)
      .unwrap()
      .is_empty());
  }
}
