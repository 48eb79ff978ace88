//! System webhook events from the source.
//!
//! Events arrive as JSON payloads carrying an `event_name` discriminator.
//! They are decoded into a closed enum and mapped through a fixed dispatch
//! table to the entity types worth refreshing early; unknown event names
//! decode to `Unknown` and are a no-op.

use serde::Deserialize;
use tracing::debug;

use crate::sync::EntityKind;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event_name", rename_all = "snake_case")]
pub enum SystemEvent {
  ProjectCreate { project_id: u64 },
  ProjectDestroy { project_id: u64 },
  UserCreate { user_id: u64 },
  UserDestroy { user_id: u64 },
  UserAddToTeam { project_id: u64, user_id: u64 },
  UserRemoveFromTeam { project_id: u64, user_id: u64 },
  GroupCreate { group_id: u64 },
  GroupDestroy { group_id: u64 },
  UserAddToGroup { group_id: u64, user_id: u64 },
  UserRemoveFromGroup { group_id: u64, user_id: u64 },
  #[serde(other)]
  Unknown,
}

/// Entity types to refresh ahead of the next scheduled cycle.
pub fn handle_system_event(event: &SystemEvent) -> Vec<EntityKind> {
  let kinds = match event {
    SystemEvent::ProjectCreate { .. } | SystemEvent::ProjectDestroy { .. } => vec![
      EntityKind::Projects,
      EntityKind::Branches,
      EntityKind::Commits,
    ],
    SystemEvent::UserCreate { .. } | SystemEvent::UserDestroy { .. } => {
      vec![EntityKind::Users, EntityKind::Commits]
    }
    SystemEvent::UserAddToTeam { .. } | SystemEvent::UserRemoveFromTeam { .. } => {
      vec![EntityKind::Projects]
    }
    SystemEvent::GroupCreate { .. }
    | SystemEvent::GroupDestroy { .. }
    | SystemEvent::UserAddToGroup { .. }
    | SystemEvent::UserRemoveFromGroup { .. } => vec![EntityKind::Groups],
    SystemEvent::Unknown => Vec::new(),
  };
  debug!(?event, ?kinds, "system event");
  kinds
}
