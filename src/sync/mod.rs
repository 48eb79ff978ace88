//! Background mirroring: reconciliation cycles and their schedule.

mod reconciler;
mod scheduler;

pub use reconciler::{CycleReport, EntityKind, Reconciler, SyncError, TypeStats, ALL_KINDS};
pub use scheduler::Scheduler;
