//! Per-entity-type reconciliation of the cache against the source.
//!
//! Each type runs one cycle: read the previously stored identifier set,
//! fetch the full current snapshot, upsert everything current, delete what
//! disappeared. Fetch-then-diff is a single failure domain per type: if any
//! page fetch fails, that type's cycle aborts before a single delete and
//! its cache stays at last-known-good. The whole cycle for a type lands as
//! one atomic write batch, so readers never see a commit in the project
//! timeline that is missing from its branch timeline.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::error::{SourceError, StoreError};
use crate::resolver::ContributorResolver;
use crate::source::{drain_commits, drain_users, SourceClient};
use crate::store::{
  branch_contributors_set, branch_key, branch_timeline, commit_key, emails_set, get_as,
  members_set, project_contributors_set, project_scope, project_timeline, split_scoped_key,
  user_timeline, CacheStore, RecordKind, TimelineEntry, WriteBatch, WriteOp,
};
use crate::types::{Branch, Commit, Contributor, Group, Project, User};

/// Entity types in their reconciliation order. Commits come after branches
/// so the timelines can be rebuilt from the freshly mirrored branch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
  Projects,
  Users,
  Branches,
  Commits,
  Groups,
}

pub const ALL_KINDS: [EntityKind; 5] = [
  EntityKind::Projects,
  EntityKind::Users,
  EntityKind::Branches,
  EntityKind::Commits,
  EntityKind::Groups,
];

impl EntityKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntityKind::Projects => "projects",
      EntityKind::Users => "users",
      EntityKind::Branches => "branches",
      EntityKind::Commits => "commits",
      EntityKind::Groups => "groups",
    }
  }
}

#[derive(Debug, Error)]
pub enum SyncError {
  #[error(transparent)]
  Source(#[from] SourceError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
  pub upserted: usize,
  pub deleted: usize,
}

/// Outcome of one full reconciliation pass.
#[derive(Debug)]
pub struct CycleReport {
  pub outcomes: Vec<(EntityKind, Result<TypeStats, SyncError>)>,
}

impl CycleReport {
  pub fn fully_ok(&self) -> bool {
    self.outcomes.iter().all(|(_, r)| r.is_ok())
  }
}

pub struct Reconciler<S, C> {
  store: Arc<S>,
  source: Arc<C>,
}

impl<S: CacheStore, C: SourceClient> Reconciler<S, C> {
  pub fn new(store: Arc<S>, source: Arc<C>) -> Self {
    Self { store, source }
  }

  /// Run one cycle for every entity type. A failed type is logged and
  /// skipped; the remaining types still run.
  pub async fn run_cycle(&self) -> CycleReport {
    self.run_kinds(&ALL_KINDS).await
  }

  pub async fn run_kinds(&self, kinds: &[EntityKind]) -> CycleReport {
    let mut outcomes = Vec::with_capacity(kinds.len());
    for kind in kinds {
      let result = self.sync_kind(*kind).await;
      match &result {
        Ok(stats) => info!(
          kind = kind.as_str(),
          upserted = stats.upserted,
          deleted = stats.deleted,
          "reconciled"
        ),
        Err(e) => warn!(
          kind = kind.as_str(),
          error = %e,
          "reconciliation aborted, cache left at last-known-good"
        ),
      }
      outcomes.push((*kind, result));
    }
    CycleReport { outcomes }
  }

  async fn sync_kind(&self, kind: EntityKind) -> Result<TypeStats, SyncError> {
    match kind {
      EntityKind::Projects => self.sync_projects().await,
      EntityKind::Users => self.sync_users().await,
      EntityKind::Branches => self.sync_branches().await,
      EntityKind::Commits => self.sync_commits().await,
      EntityKind::Groups => self.sync_groups().await,
    }
  }

  async fn sync_projects(&self) -> Result<TypeStats, SyncError> {
    let old = self.store.record_keys(RecordKind::Project, None)?;
    let current = self.source.list_projects().await?;

    let mut batch = WriteBatch::new();
    let mut current_ids = HashSet::new();
    for mut project in current {
      let key = project.id.to_string();
      // Derived timestamps belong to the commits cycle; carry them over.
      if let Some(existing) = get_as::<Project>(&*self.store, RecordKind::Project, &key)? {
        project.first_commit_at = existing.first_commit_at;
        project.last_commit_at = existing.last_commit_at;
      }
      batch.put(RecordKind::Project, key.clone(), &project)?;
      current_ids.insert(key);
    }
    let upserted = current_ids.len();

    let mut deleted = 0;
    for key in old {
      if current_ids.contains(&key) {
        continue;
      }
      let project_id: u64 = key
        .parse()
        .map_err(|_| StoreError(format!("malformed project key {}", key)))?;
      self.delete_project(&mut batch, project_id)?;
      deleted += 1;
    }

    self.store.apply(batch)?;
    Ok(TypeStats { upserted, deleted })
  }

  /// Remove a project record together with everything scoped under it.
  fn delete_project(&self, batch: &mut WriteBatch, project_id: u64) -> Result<(), StoreError> {
    let key = project_id.to_string();
    batch.push(WriteOp::DeleteRecord {
      kind: RecordKind::Project,
      key,
    });

    let scope = project_scope(project_id);
    for branch in self.store.record_keys(RecordKind::Branch, Some(&scope))? {
      if let Some((_, name)) = split_scoped_key(&branch) {
        batch.push(WriteOp::DeleteTimeline {
          timeline: branch_timeline(project_id, name),
        });
        batch.push(WriteOp::DeleteSet {
          set: branch_contributors_set(project_id, name),
        });
      }
      batch.push(WriteOp::DeleteRecord {
        kind: RecordKind::Branch,
        key: branch,
      });
    }
    for commit in self.store.record_keys(RecordKind::Commit, Some(&scope))? {
      batch.push(WriteOp::DeleteRecord {
        kind: RecordKind::Commit,
        key: commit,
      });
    }
    batch.push(WriteOp::DeleteTimeline {
      timeline: project_timeline(project_id),
    });
    batch.push(WriteOp::DeleteSet {
      set: project_contributors_set(project_id),
    });
    Ok(())
  }

  async fn sync_users(&self) -> Result<TypeStats, SyncError> {
    let old = self.store.record_keys(RecordKind::User, None)?;
    let old_emails = self.store.record_keys(RecordKind::EmailOwner, None)?;

    let mut current = drain_users(&*self.source).await?;
    for user in &mut current {
      // Declared email first, then any secondary emails.
      let secondary = self.source.list_user_emails(user.id).await?;
      for email in secondary {
        if !user.emails.contains(&email) {
          user.emails.push(email);
        }
      }
    }

    let mut batch = WriteBatch::new();
    let mut current_ids = HashSet::new();
    let mut email_owners: HashMap<String, u64> = HashMap::new();
    for mut user in current {
      let key = user.id.to_string();
      if let Some(existing) = get_as::<User>(&*self.store, RecordKind::User, &key)? {
        user.first_commit_at = existing.first_commit_at;
        user.last_commit_at = existing.last_commit_at;
      }
      for email in &user.emails {
        email_owners.insert(email.clone(), user.id);
      }
      batch.push(WriteOp::ReplaceSet {
        set: emails_set(user.id),
        members: user.emails.clone(),
      });
      batch.put(RecordKind::User, key.clone(), &user)?;
      current_ids.insert(key);
    }
    let upserted = current_ids.len();

    for (email, owner) in &email_owners {
      batch.put(RecordKind::EmailOwner, email.clone(), owner)?;
    }
    for email in old_emails {
      if !email_owners.contains_key(&email) {
        batch.push(WriteOp::DeleteRecord {
          kind: RecordKind::EmailOwner,
          key: email,
        });
      }
    }

    let mut deleted = 0;
    for key in old {
      if current_ids.contains(&key) {
        continue;
      }
      let user_id: u64 = key
        .parse()
        .map_err(|_| StoreError(format!("malformed user key {}", key)))?;
      self.delete_user(&mut batch, user_id)?;
      deleted += 1;
    }

    self.store.apply(batch)?;
    Ok(TypeStats { upserted, deleted })
  }

  /// Remove a user and scrub every secondary index referencing it:
  /// email set, email_owner entries, group membership sets, commit
  /// timeline, contributor sets.
  fn delete_user(&self, batch: &mut WriteBatch, user_id: u64) -> Result<(), StoreError> {
    batch.push(WriteOp::DeleteRecord {
      kind: RecordKind::User,
      key: user_id.to_string(),
    });
    batch.push(WriteOp::DeleteSet {
      set: emails_set(user_id),
    });
    batch.push(WriteOp::DeleteTimeline {
      timeline: user_timeline(user_id),
    });

    for group in self.store.record_keys(RecordKind::Group, None)? {
      let group_id: u64 = match group.parse() {
        Ok(id) => id,
        Err(_) => continue,
      };
      batch.push(WriteOp::RemoveFromSet {
        set: members_set(group_id),
        member: user_id.to_string(),
      });
    }

    let member = Contributor::User { id: user_id }.to_member();
    for project in self.store.record_keys(RecordKind::Project, None)? {
      let project_id: u64 = match project.parse() {
        Ok(id) => id,
        Err(_) => continue,
      };
      batch.push(WriteOp::RemoveFromSet {
        set: project_contributors_set(project_id),
        member: member.clone(),
      });
      let scope = project_scope(project_id);
      for branch in self.store.record_keys(RecordKind::Branch, Some(&scope))? {
        if let Some((_, name)) = split_scoped_key(&branch) {
          batch.push(WriteOp::RemoveFromSet {
            set: branch_contributors_set(project_id, name),
            member: member.clone(),
          });
        }
      }
    }
    Ok(())
  }

  async fn sync_branches(&self) -> Result<TypeStats, SyncError> {
    let old = self.store.record_keys(RecordKind::Branch, None)?;

    let mut current: Vec<Branch> = Vec::new();
    for project in self.store.record_keys(RecordKind::Project, None)? {
      let project_id: u64 = match project.parse() {
        Ok(id) => id,
        Err(_) => continue,
      };
      current.extend(self.source.list_branches(project_id).await?);
    }

    let mut batch = WriteBatch::new();
    let mut current_keys = HashSet::new();
    for mut branch in current {
      let key = branch_key(branch.project_id, &branch.name);
      if let Some(existing) = get_as::<Branch>(&*self.store, RecordKind::Branch, &key)? {
        branch.created_at = existing.created_at;
        branch.last_commit_at = existing.last_commit_at;
      }
      branch.contributors = Vec::new();
      batch.put(RecordKind::Branch, key.clone(), &branch)?;
      current_keys.insert(key);
    }
    let upserted = current_keys.len();

    let mut deleted = 0;
    for key in old {
      if current_keys.contains(&key) {
        continue;
      }
      if let Some((project_id, name)) = split_scoped_key(&key) {
        batch.push(WriteOp::DeleteTimeline {
          timeline: branch_timeline(project_id, name),
        });
        batch.push(WriteOp::DeleteSet {
          set: branch_contributors_set(project_id, name),
        });
      }
      batch.push(WriteOp::DeleteRecord {
        kind: RecordKind::Branch,
        key,
      });
      deleted += 1;
    }

    self.store.apply(batch)?;
    Ok(TypeStats { upserted, deleted })
  }

  async fn sync_commits(&self) -> Result<TypeStats, SyncError> {
    let old: HashSet<String> = self
      .store
      .record_keys(RecordKind::Commit, None)?
      .into_iter()
      .collect();
    let resolver = ContributorResolver::new(&*self.store);

    // Fetch everything first; a single page failure aborts the whole type
    // before any mutation.
    let mut fetched: Vec<(u64, Vec<(String, Vec<Commit>)>)> = Vec::new();
    for project in self.store.record_keys(RecordKind::Project, None)? {
      let project_id: u64 = match project.parse() {
        Ok(id) => id,
        Err(_) => continue,
      };
      let scope = project_scope(project_id);
      let mut per_branch = Vec::new();
      for branch in self.store.record_keys(RecordKind::Branch, Some(&scope))? {
        let name = match split_scoped_key(&branch) {
          Some((_, name)) => name.to_string(),
          None => continue,
        };
        let commits = drain_commits(&*self.source, project_id, &name).await?;
        per_branch.push((name, commits));
      }
      fetched.push((project_id, per_branch));
    }

    let mut batch = WriteBatch::new();
    let mut current_keys = HashSet::new();
    // Accumulated across all projects, per resolved user.
    let mut user_entries: BTreeMap<u64, Vec<TimelineEntry>> = BTreeMap::new();

    for (project_id, per_branch) in fetched {
      // De-duplicate by sha across branches; the first occurrence wins.
      let mut project_commits: HashMap<String, Commit> = HashMap::new();
      let mut project_order: Vec<String> = Vec::new();
      for (_, commits) in &per_branch {
        for commit in commits {
          if !project_commits.contains_key(&commit.sha) {
            project_order.push(commit.sha.clone());
            project_commits.insert(commit.sha.clone(), commit.clone());
          }
        }
      }

      for sha in &project_order {
        let commit = &project_commits[sha];
        let key = commit_key(project_id, sha);
        batch.put(RecordKind::Commit, key.clone(), commit)?;
        current_keys.insert(key);
      }

      let project_entries = sorted_entries(
        project_order
          .iter()
          .map(|sha| (&project_commits[sha], commit_key(project_id, sha))),
      );

      // Identity resolution over the de-duplicated commit set, so a
      // commit shared by several branches counts once.
      let mut project_contributors: Vec<Contributor> = Vec::new();
      for sha in &project_order {
        let commit = &project_commits[sha];
        let who = resolver.resolve(&commit.author_email)?;
        if let Contributor::User { id } = who {
          user_entries.entry(id).or_default().push(TimelineEntry {
            member: commit_key(project_id, sha),
            score: commit.created_at,
          });
        }
        if !project_contributors.contains(&who) {
          project_contributors.push(who);
        }
      }

      for (name, commits) in &per_branch {
        let branch_entries =
          sorted_entries(commits.iter().map(|c| (c, commit_key(project_id, &c.sha))));

        let mut branch_contributors: Vec<Contributor> = Vec::new();
        for commit in commits {
          let who = resolver.resolve(&commit.author_email)?;
          if !branch_contributors.contains(&who) {
            branch_contributors.push(who);
          }
        }

        let branch_record_key = branch_key(project_id, name);
        if let Some(mut branch) =
          get_as::<Branch>(&*self.store, RecordKind::Branch, &branch_record_key)?
        {
          branch.created_at = branch_entries.first().map(|e| e.score);
          branch.last_commit_at = branch_entries.last().map(|e| e.score);
          batch.put(RecordKind::Branch, branch_record_key, &branch)?;
        }

        batch.push(WriteOp::ReplaceSet {
          set: branch_contributors_set(project_id, name),
          members: branch_contributors.iter().map(|c| c.to_member()).collect(),
        });
        batch.push(WriteOp::ReplaceTimeline {
          timeline: branch_timeline(project_id, name),
          entries: branch_entries,
        });
      }

      let project_record_key = project_id.to_string();
      if let Some(mut project) =
        get_as::<Project>(&*self.store, RecordKind::Project, &project_record_key)?
      {
        project.first_commit_at = project_entries.first().map(|e| e.score);
        project.last_commit_at = project_entries.last().map(|e| e.score);
        batch.put(RecordKind::Project, project_record_key, &project)?;
      }

      batch.push(WriteOp::ReplaceSet {
        set: project_contributors_set(project_id),
        members: project_contributors.iter().map(|c| c.to_member()).collect(),
      });
      batch.push(WriteOp::ReplaceTimeline {
        timeline: project_timeline(project_id),
        entries: project_entries,
      });
    }

    // Per-user timelines and derived first/last commit dates; users whose
    // commits all disappeared get cleared.
    for user_key in self.store.record_keys(RecordKind::User, None)? {
      let user_id: u64 = match user_key.parse() {
        Ok(id) => id,
        Err(_) => continue,
      };
      let entries = user_entries.remove(&user_id);
      let mut user = match get_as::<User>(&*self.store, RecordKind::User, &user_key)? {
        Some(user) => user,
        None => continue,
      };
      match entries {
        Some(mut entries) => {
          // Commits from one user may interleave across projects.
          entries.sort_by_key(|e| e.score);
          user.first_commit_at = entries.first().map(|e| e.score);
          user.last_commit_at = entries.last().map(|e| e.score);
          batch.put(RecordKind::User, user_key, &user)?;
          batch.push(WriteOp::ReplaceTimeline {
            timeline: user_timeline(user_id),
            entries,
          });
        }
        None => {
          if user.first_commit_at.is_some() || user.last_commit_at.is_some() {
            user.first_commit_at = None;
            user.last_commit_at = None;
            batch.put(RecordKind::User, user_key, &user)?;
          }
          batch.push(WriteOp::DeleteTimeline {
            timeline: user_timeline(user_id),
          });
        }
      }
    }

    let upserted = current_keys.len();
    let mut deleted = 0;
    for key in &old {
      if !current_keys.contains(key) {
        batch.push(WriteOp::DeleteRecord {
          kind: RecordKind::Commit,
          key: key.clone(),
        });
        deleted += 1;
      }
    }

    self.store.apply(batch)?;
    Ok(TypeStats { upserted, deleted })
  }

  async fn sync_groups(&self) -> Result<TypeStats, SyncError> {
    let old = self.store.record_keys(RecordKind::Group, None)?;

    let groups = self.source.list_groups().await?;
    let mut memberships: Vec<(u64, Vec<u64>)> = Vec::new();
    for group in &groups {
      let members = self.source.list_group_members(group.id).await?;
      memberships.push((group.id, members));
    }

    let mut batch = WriteBatch::new();
    let mut current_ids = HashSet::new();
    for group in &groups {
      // Members live in the relation set, not the record.
      let record = Group {
        id: group.id,
        name: group.name.clone(),
        members: Vec::new(),
      };
      batch.put(RecordKind::Group, group.id.to_string(), &record)?;
      current_ids.insert(group.id.to_string());
    }
    for (group_id, members) in memberships {
      batch.push(WriteOp::ReplaceSet {
        set: members_set(group_id),
        members: members.iter().map(|id| id.to_string()).collect(),
      });
    }
    let upserted = current_ids.len();

    let mut deleted = 0;
    for key in old {
      if current_ids.contains(&key) {
        continue;
      }
      if let Ok(group_id) = key.parse::<u64>() {
        batch.push(WriteOp::DeleteSet {
          set: members_set(group_id),
        });
      }
      batch.push(WriteOp::DeleteRecord {
        kind: RecordKind::Group,
        key,
      });
      deleted += 1;
    }

    self.store.apply(batch)?;
    Ok(TypeStats { upserted, deleted })
  }
}

/// Build timeline entries sorted ascending by timestamp; the sort is
/// stable, so equal timestamps keep fetch order.
fn sorted_entries<'a>(commits: impl Iterator<Item = (&'a Commit, String)>) -> Vec<TimelineEntry> {
  let mut entries: Vec<TimelineEntry> = commits
    .map(|(commit, member)| TimelineEntry {
      member,
      score: commit.created_at,
    })
    .collect();
  entries.sort_by_key(|e| e.score);
  entries
}
