//! Typed read operations over the mirror, with source-direct fallback.
//!
//! Every operation validates its parameters before any I/O, reads the
//! cache when one is configured, and otherwise falls back to paging the
//! live source and applying the same filters in memory. Results and
//! failures are distinct values: a missing entity is `NotFound`, never an
//! empty list.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::QueryError;
use crate::resolver::{resolve_among, ContributorResolver};
use crate::source::{drain_commits, drain_users, SourceClient};
use crate::store::{
  branch_contributors_set, branch_key, branch_timeline, commit_key, get_as, members_set,
  project_scope, project_timeline, CacheStore, RecordKind,
};
use crate::types::{
  Branch, Commit, Contributor, Group, MergeRequest, MergeState, Owner, OwnerKind, Project,
  Relation, User,
};
use crate::window::TimeWindow;

/// A project owner resolved to its full record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectOwner {
  User(User),
  Group(Group),
}

pub struct QueryService<S, C> {
  store: Option<Arc<S>>,
  source: Arc<C>,
}

/// Parse an optional `true`/`false` query flag; absence means `false`.
fn parse_flag(value: Option<&str>) -> Result<bool, QueryError> {
  match value {
    None | Some("false") => Ok(false),
    Some("true") => Ok(true),
    Some(other) => Err(QueryError::Validation(format!(
      "flag must be true or false, got {:?}",
      other
    ))),
  }
}

/// Parse an optional pagination offset.
fn parse_offset(value: Option<&str>) -> Result<Option<usize>, QueryError> {
  match value {
    None => Ok(None),
    Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
      QueryError::Validation(format!(
        "offset must be a non-negative integer, got {:?}",
        raw
      ))
    }),
  }
}

fn parse_relation(value: &str) -> Result<Relation, QueryError> {
  Relation::from_param(value).ok_or_else(|| {
    QueryError::Validation(format!(
      "relation must be owner or contributor, got {:?}",
      value
    ))
  })
}

/// Drop the first `offset` elements; an offset past the end yields empty.
fn offset_slice<T>(items: Vec<T>, offset: Option<usize>) -> Vec<T> {
  match offset {
    Some(n) => items.into_iter().skip(n).collect(),
    None => items,
  }
}

fn dedup_sorted(mut ids: Vec<u64>) -> Vec<u64> {
  ids.sort_unstable();
  ids.dedup();
  ids
}

impl<S: CacheStore, C: SourceClient> QueryService<S, C> {
  /// `store = None` serves every read straight from the source.
  pub fn new(store: Option<Arc<S>>, source: Arc<C>) -> Self {
    Self { store, source }
  }

  pub async fn get_project(&self, id: u64) -> Result<Project, QueryError> {
    match &self.store {
      Some(store) => get_as::<Project>(&**store, RecordKind::Project, &id.to_string())?
        .ok_or(QueryError::NotFound("project")),
      None => self.fetch_project(id).await,
    }
  }

  pub async fn get_projects(&self) -> Result<Vec<Project>, QueryError> {
    match &self.store {
      Some(store) => {
        let mut ids: Vec<u64> = store
          .record_keys(RecordKind::Project, None)?
          .iter()
          .filter_map(|k| k.parse().ok())
          .collect();
        ids.sort_unstable();
        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
          if let Some(p) = get_as::<Project>(&**store, RecordKind::Project, &id.to_string())? {
            projects.push(p);
          }
        }
        Ok(projects)
      }
      None => {
        let mut projects = self.source.list_projects().await?;
        projects.sort_by_key(|p| p.id);
        Ok(projects)
      }
    }
  }

  /// Resolve the project's polymorphic owner to a full user or group
  /// record.
  pub async fn get_project_owner(&self, id: u64) -> Result<ProjectOwner, QueryError> {
    let project = self.get_project(id).await?;
    match project.owner.kind {
      OwnerKind::User => Ok(ProjectOwner::User(self.get_user(project.owner.id).await?)),
      OwnerKind::Group => Ok(ProjectOwner::Group(self.get_group(project.owner.id).await?)),
    }
  }

  /// `default_only` short-circuits to a one-element list holding the
  /// project's default branch.
  pub async fn get_branches(
    &self,
    project_id: u64,
    default_only: Option<&str>,
  ) -> Result<Vec<Branch>, QueryError> {
    let default_only = parse_flag(default_only)?;

    if default_only {
      let project = self.get_project(project_id).await?;
      return match project.default_branch {
        Some(name) => Ok(vec![self.get_branch(project_id, &name).await?]),
        None => Ok(Vec::new()),
      };
    }

    match &self.store {
      Some(store) => {
        self.get_project(project_id).await?;
        let keys = store.record_keys(RecordKind::Branch, Some(&project_scope(project_id)))?;
        let mut branches = Vec::with_capacity(keys.len());
        for key in keys {
          if let Some(branch) = self.load_branch(store, &key)? {
            branches.push(branch);
          }
        }
        Ok(branches)
      }
      None => {
        self.fetch_project(project_id).await?;
        Ok(self.source.list_branches(project_id).await?)
      }
    }
  }

  pub async fn get_branch(&self, project_id: u64, name: &str) -> Result<Branch, QueryError> {
    match &self.store {
      Some(store) => self
        .load_branch(store, &branch_key(project_id, name))?
        .ok_or(QueryError::NotFound("branch")),
      None => {
        let branches = self.source.list_branches(project_id).await?;
        branches
          .into_iter()
          .find(|b| b.name == name)
          .ok_or(QueryError::NotFound("branch"))
      }
    }
  }

  /// Commits of one branch, or the de-duplicated union across all
  /// branches when `branch` is omitted. Ascending by timestamp; the user
  /// filter applies to the author's resolved identity, then `offset`
  /// drops the leading entries.
  pub async fn get_commits(
    &self,
    project_id: u64,
    branch: Option<&str>,
    user_id: Option<u64>,
    offset: Option<&str>,
    window: TimeWindow,
  ) -> Result<Vec<Commit>, QueryError> {
    let offset = parse_offset(offset)?;
    if let Some(uid) = user_id {
      // Unknown user is not-found, not an empty result.
      self.get_user(uid).await?;
    }

    let mut commits = match &self.store {
      Some(store) => {
        let timeline = match branch {
          Some(name) => {
            self.get_branch(project_id, name).await?;
            branch_timeline(project_id, name)
          }
          None => {
            self.get_project(project_id).await?;
            project_timeline(project_id)
          }
        };
        let entries = store.timeline_range(&timeline, window.start, window.end)?;
        let mut commits = Vec::with_capacity(entries.len());
        for entry in entries {
          if let Some(c) = get_as::<Commit>(&**store, RecordKind::Commit, &entry.member)? {
            commits.push(c);
          }
        }
        commits
      }
      None => self.fetch_commits(project_id, branch, &window).await?,
    };

    if let Some(uid) = user_id {
      commits = self.filter_by_author(commits, uid).await?;
    }
    Ok(offset_slice(commits, offset))
  }

  pub async fn get_commit(&self, project_id: u64, sha: &str) -> Result<Commit, QueryError> {
    match &self.store {
      Some(store) => {
        get_as::<Commit>(&**store, RecordKind::Commit, &commit_key(project_id, sha))?
          .ok_or(QueryError::NotFound("commit"))
      }
      None => {
        let commits = self
          .fetch_commits(project_id, None, &TimeWindow::all())
          .await?;
        commits
          .into_iter()
          .find(|c| c.sha == sha)
          .ok_or(QueryError::NotFound("commit"))
      }
    }
  }

  /// Distinct resolved author identities among commits in the window,
  /// in order of first appearance.
  pub async fn get_contributors(
    &self,
    project_id: u64,
    branch: Option<&str>,
    window: TimeWindow,
  ) -> Result<Vec<Contributor>, QueryError> {
    let commits = self
      .get_commits(project_id, branch, None, None, window)
      .await?;

    match &self.store {
      Some(store) => {
        let resolver = ContributorResolver::new(&**store);
        let mut seen = Vec::new();
        for commit in &commits {
          let who = resolver.resolve(&commit.author_email)?;
          if !seen.contains(&who) {
            seen.push(who);
          }
        }
        Ok(seen)
      }
      None => {
        let users = drain_users(&*self.source).await?;
        let mut seen = Vec::new();
        for commit in &commits {
          let who = resolve_among(&users, &commit.author_email);
          if !seen.contains(&who) {
            seen.push(who);
          }
        }
        Ok(seen)
      }
    }
  }

  pub async fn get_user(&self, id: u64) -> Result<User, QueryError> {
    match &self.store {
      Some(store) => get_as::<User>(&**store, RecordKind::User, &id.to_string())?
        .ok_or(QueryError::NotFound("user")),
      None => {
        let users = drain_users(&*self.source).await?;
        let mut user = users
          .into_iter()
          .find(|u| u.id == id)
          .ok_or(QueryError::NotFound("user"))?;
        for email in self.source.list_user_emails(id).await? {
          if !user.emails.contains(&email) {
            user.emails.push(email);
          }
        }
        Ok(user)
      }
    }
  }

  pub async fn get_users(&self, offset: Option<&str>) -> Result<Vec<User>, QueryError> {
    let offset = parse_offset(offset)?;
    let mut users = match &self.store {
      Some(store) => {
        let mut ids: Vec<u64> = store
          .record_keys(RecordKind::User, None)?
          .iter()
          .filter_map(|k| k.parse().ok())
          .collect();
        ids.sort_unstable();
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
          if let Some(u) = get_as::<User>(&**store, RecordKind::User, &id.to_string())? {
            users.push(u);
          }
        }
        users
      }
      None => drain_users(&*self.source).await?,
    };
    users.sort_by_key(|u| u.id);
    Ok(offset_slice(users, offset))
  }

  pub async fn get_group(&self, id: u64) -> Result<Group, QueryError> {
    match &self.store {
      Some(store) => {
        let mut group = get_as::<Group>(&**store, RecordKind::Group, &id.to_string())?
          .ok_or(QueryError::NotFound("group"))?;
        group.members = dedup_sorted(
          store
            .set_members(&members_set(id))?
            .iter()
            .filter_map(|m| m.parse().ok())
            .collect(),
        );
        Ok(group)
      }
      None => {
        let groups = self.source.list_groups().await?;
        let mut group = groups
          .into_iter()
          .find(|g| g.id == id)
          .ok_or(QueryError::NotFound("group"))?;
        group.members = dedup_sorted(self.source.list_group_members(id).await?);
        Ok(group)
      }
    }
  }

  pub async fn get_groups(&self) -> Result<Vec<Group>, QueryError> {
    let ids: Vec<u64> = match &self.store {
      Some(store) => store
        .record_keys(RecordKind::Group, None)?
        .iter()
        .filter_map(|k| k.parse().ok())
        .collect(),
      None => self
        .source
        .list_groups()
        .await?
        .iter()
        .map(|g| g.id)
        .collect(),
    };
    let mut groups = Vec::with_capacity(ids.len());
    for id in dedup_sorted(ids) {
      groups.push(self.get_group(id).await?);
    }
    Ok(groups)
  }

  /// Projects a group owns, or projects any group member contributed to
  /// on the default branch.
  pub async fn get_group_projects(
    &self,
    group_id: u64,
    relation: &str,
  ) -> Result<Vec<u64>, QueryError> {
    let relation = parse_relation(relation)?;
    let group = self.get_group(group_id).await?;

    match relation {
      Relation::Owner => {
        self
          .projects_owned_by(Owner {
            kind: OwnerKind::Group,
            id: group_id,
          })
          .await
      }
      Relation::Contributor => {
        let members: Vec<Contributor> = group
          .members
          .iter()
          .map(|id| Contributor::User { id: *id })
          .collect();
        self.projects_contributed_by(&members).await
      }
    }
  }

  pub async fn get_user_projects(
    &self,
    user_id: u64,
    relation: &str,
  ) -> Result<Vec<u64>, QueryError> {
    let relation = parse_relation(relation)?;
    self.get_user(user_id).await?;

    match relation {
      Relation::Owner => {
        self
          .projects_owned_by(Owner {
            kind: OwnerKind::User,
            id: user_id,
          })
          .await
      }
      Relation::Contributor => {
        self
          .projects_contributed_by(&[Contributor::User { id: user_id }])
          .await
      }
    }
  }

  /// Merge requests were never mirrored by the source integration; the
  /// state parameter still validates, then the lookup is not-found.
  pub async fn get_merge_requests(
    &self,
    project_id: u64,
    state: Option<&str>,
  ) -> Result<Vec<MergeRequest>, QueryError> {
    if let Some(raw) = state {
      MergeState::from_param(raw).ok_or_else(|| {
        QueryError::Validation(format!(
          "state must be opened, closed, merged or all, got {:?}",
          raw
        ))
      })?;
    }
    self.get_project(project_id).await?;
    Err(QueryError::NotFound("merge requests"))
  }

  fn load_branch(&self, store: &Arc<S>, key: &str) -> Result<Option<Branch>, QueryError> {
    let mut branch = match get_as::<Branch>(&**store, RecordKind::Branch, key)? {
      Some(branch) => branch,
      None => return Ok(None),
    };
    branch.contributors = store
      .set_members(&branch_contributors_set(branch.project_id, &branch.name))?
      .iter()
      .filter_map(|m| Contributor::from_member(m))
      .collect();
    Ok(Some(branch))
  }

  async fn fetch_project(&self, id: u64) -> Result<Project, QueryError> {
    let projects = self.source.list_projects().await?;
    projects
      .into_iter()
      .find(|p| p.id == id)
      .ok_or(QueryError::NotFound("project"))
  }

  /// Source-direct commit listing: page every branch, union by sha,
  /// filter by window, sort ascending.
  async fn fetch_commits(
    &self,
    project_id: u64,
    branch: Option<&str>,
    window: &TimeWindow,
  ) -> Result<Vec<Commit>, QueryError> {
    self.fetch_project(project_id).await?;
    let branches = self.source.list_branches(project_id).await?;

    let names: Vec<String> = match branch {
      Some(name) => {
        if !branches.iter().any(|b| b.name == name) {
          return Err(QueryError::NotFound("branch"));
        }
        vec![name.to_string()]
      }
      None => branches.into_iter().map(|b| b.name).collect(),
    };

    let mut seen = HashSet::new();
    let mut commits = Vec::new();
    for name in &names {
      for commit in drain_commits(&*self.source, project_id, name).await? {
        if window.contains(commit.created_at) && seen.insert(commit.sha.clone()) {
          commits.push(commit);
        }
      }
    }
    commits.sort_by_key(|c| c.created_at);
    Ok(commits)
  }

  async fn filter_by_author(
    &self,
    commits: Vec<Commit>,
    user_id: u64,
  ) -> Result<Vec<Commit>, QueryError> {
    match &self.store {
      Some(store) => {
        let resolver = ContributorResolver::new(&**store);
        let mut kept = Vec::new();
        for commit in commits {
          if resolver.resolve(&commit.author_email)?.user_id() == Some(user_id) {
            kept.push(commit);
          }
        }
        Ok(kept)
      }
      None => {
        let user = self.get_user(user_id).await?;
        Ok(
          commits
            .into_iter()
            .filter(|c| user.emails.iter().any(|e| *e == c.author_email))
            .collect(),
        )
      }
    }
  }

  async fn projects_owned_by(&self, owner: Owner) -> Result<Vec<u64>, QueryError> {
    let projects = self.get_projects().await?;
    Ok(
      projects
        .into_iter()
        .filter(|p| p.owner == owner)
        .map(|p| p.id)
        .collect(),
    )
  }

  /// Projects whose default-branch contributor set intersects `who`.
  async fn projects_contributed_by(&self, who: &[Contributor]) -> Result<Vec<u64>, QueryError> {
    let mut ids = Vec::new();
    for project in self.get_projects().await? {
      let default = match &project.default_branch {
        Some(name) => name.clone(),
        None => continue,
      };
      let contributors = match &self.store {
        Some(store) => store
          .set_members(&branch_contributors_set(project.id, &default))?
          .iter()
          .filter_map(|m| Contributor::from_member(m))
          .collect::<Vec<_>>(),
        None => {
          self
            .get_contributors(project.id, Some(&default), TimeWindow::all())
            .await?
        }
      };
      if who.iter().any(|w| contributors.contains(w)) {
        ids.push(project.id);
      }
    }
    Ok(dedup_sorted(ids))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use crate::sync::Reconciler;
  use crate::testutil::{branch, commit, group, project, user, StubSource};
  use crate::window::now_ms;

  fn fixture() -> StubSource {
    let mut source = StubSource::default();
    source.projects = vec![project(1, "demo", "main"), {
      let mut p = project(2, "tools", "main");
      p.owner = Owner {
        kind: OwnerKind::Group,
        id: 3,
      };
      p
    }];
    source
      .branches
      .insert(1, vec![branch(1, "main"), branch(1, "dev")]);
    source.branches.insert(2, vec![branch(2, "main")]);
    source.commits.insert(
      (1, "main".to_string()),
      vec![
        commit(1, "c1", "e1@x.y", 100),
        commit(1, "c2", "e2@x.y", 200),
        commit(1, "c3", "e1@x.y", 300),
      ],
    );
    source.commits.insert(
      (1, "dev".to_string()),
      vec![
        commit(1, "c2", "e2@x.y", 200),
        commit(1, "c4", "e3@x.y", 400),
      ],
    );
    source.commits.insert(
      (2, "main".to_string()),
      vec![commit(2, "d1", "e2@x.y", 500)],
    );
    source.users = vec![user(7, "e1@x.y"), user(8, "e2@x.y")];
    source.groups = vec![group(3, "team")];
    source.members.insert(3, vec![7, 8]);
    source
  }

  async fn mirrored() -> QueryService<MemoryStore, StubSource> {
    let source = Arc::new(fixture());
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone(), source.clone());
    assert!(reconciler.run_cycle().await.fully_ok());
    QueryService::new(Some(store), source)
  }

  fn source_only() -> QueryService<MemoryStore, StubSource> {
    QueryService::new(None, Arc::new(fixture()))
  }

  fn shas(commits: &[Commit]) -> Vec<&str> {
    commits.iter().map(|c| c.sha.as_str()).collect()
  }

  #[tokio::test]
  async fn window_is_inclusive_and_ascending() {
    let q = mirrored().await;
    let commits = q
      .get_commits(1, Some("main"), None, None, TimeWindow::new(101, 300).unwrap())
      .await
      .unwrap();
    assert_eq!(shas(&commits), vec!["c2", "c3"]);
  }

  #[tokio::test]
  async fn omitted_branch_unions_and_dedupes() {
    let q = mirrored().await;
    let commits = q
      .get_commits(1, None, None, None, TimeWindow::all())
      .await
      .unwrap();
    assert_eq!(shas(&commits), vec!["c1", "c2", "c3", "c4"]);
  }

  #[tokio::test]
  async fn user_filter_matches_resolved_identity() {
    let q = mirrored().await;
    let commits = q
      .get_commits(1, Some("main"), Some(7), None, TimeWindow::all())
      .await
      .unwrap();
    assert_eq!(shas(&commits), vec!["c1", "c3"]);

    let err = q
      .get_commits(1, Some("main"), Some(999), None, TimeWindow::all())
      .await
      .unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn offset_slices_after_filtering() {
    let q = mirrored().await;
    let commits = q
      .get_commits(1, None, None, Some("2"), TimeWindow::all())
      .await
      .unwrap();
    assert_eq!(shas(&commits), vec!["c3", "c4"]);

    // Past-the-end offset is an empty list, not an error.
    let commits = q
      .get_commits(1, None, None, Some("100"), TimeWindow::all())
      .await
      .unwrap();
    assert!(commits.is_empty());

    let err = q
      .get_commits(1, None, None, Some("-1"), TimeWindow::all())
      .await
      .unwrap_err();
    assert!(err.is_validation());
  }

  #[tokio::test]
  async fn contributors_are_distinct_identities() {
    let q = mirrored().await;
    let contributors = q
      .get_contributors(
        1,
        Some("main"),
        TimeWindow::from_params(Some(0), Some(now_ms())).unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(
      contributors,
      vec![Contributor::User { id: 7 }, Contributor::User { id: 8 }]
    );

    // Branch-less form includes the unregistered author on dev.
    let contributors = q.get_contributors(1, None, TimeWindow::all()).await.unwrap();
    assert!(contributors.contains(&Contributor::External {
      email: "e3@x.y".to_string()
    }));
  }

  #[tokio::test]
  async fn default_only_short_circuits_to_default_branch() {
    let q = mirrored().await;
    let branches = q.get_branches(1, Some("true")).await.unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");

    let all = q.get_branches(1, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let err = q.get_branches(1, Some("yes")).await.unwrap_err();
    assert!(err.is_validation());
  }

  #[tokio::test]
  async fn branch_read_joins_contributor_set() {
    let q = mirrored().await;
    let branch = q.get_branch(1, "dev").await.unwrap();
    assert!(branch.contributors.contains(&Contributor::User { id: 8 }));
    assert!(branch.contributors.contains(&Contributor::External {
      email: "e3@x.y".to_string()
    }));

    let err = q.get_branch(1, "gone").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn unknown_ids_are_not_found_sentinels() {
    let q = mirrored().await;
    assert!(q.get_project(99).await.unwrap_err().is_not_found());
    assert!(q.get_user(99).await.unwrap_err().is_not_found());
    assert!(q.get_group(99).await.unwrap_err().is_not_found());
    assert!(q.get_commit(1, "nope").await.unwrap_err().is_not_found());
  }

  #[tokio::test]
  async fn owner_resolves_to_full_record() {
    let q = mirrored().await;
    match q.get_project_owner(2).await.unwrap() {
      ProjectOwner::Group(g) => {
        assert_eq!(g.id, 3);
        assert_eq!(g.members, vec![7, 8]);
      }
      other => panic!("expected group owner, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn users_listing_is_ordered_with_offset() {
    let q = mirrored().await;
    let users = q.get_users(None).await.unwrap();
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![7, 8]);

    let users = q.get_users(Some("1")).await.unwrap();
    assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![8]);

    assert!(q.get_users(Some("5")).await.unwrap().is_empty());
    assert!(q.get_users(Some("x")).await.unwrap_err().is_validation());
  }

  #[tokio::test]
  async fn relation_queries_cover_owner_and_contributor() {
    let q = mirrored().await;

    // Group 3 owns project 2 and its members committed on both defaults.
    assert_eq!(q.get_group_projects(3, "owner").await.unwrap(), vec![2]);
    assert_eq!(
      q.get_group_projects(3, "contributor").await.unwrap(),
      vec![1, 2]
    );

    // User 7 only committed to project 1's default branch.
    assert_eq!(
      q.get_user_projects(7, "contributor").await.unwrap(),
      vec![1]
    );
    assert_eq!(q.get_user_projects(7, "owner").await.unwrap(), vec![1]);

    assert!(q
      .get_group_projects(3, "member")
      .await
      .unwrap_err()
      .is_validation());
  }

  #[tokio::test]
  async fn merge_requests_validate_then_report_not_found() {
    let q = mirrored().await;
    assert!(q
      .get_merge_requests(1, Some("bogus"))
      .await
      .unwrap_err()
      .is_validation());
    assert!(q
      .get_merge_requests(1, Some("opened"))
      .await
      .unwrap_err()
      .is_not_found());
  }

  #[tokio::test]
  async fn source_fallback_matches_cached_results() {
    let cached = mirrored().await;
    let direct = source_only();
    let window = TimeWindow::new(101, 400).unwrap();

    let a = cached
      .get_commits(1, None, None, None, window)
      .await
      .unwrap();
    let b = direct
      .get_commits(1, None, None, None, window)
      .await
      .unwrap();
    assert_eq!(shas(&a), shas(&b));

    let a = cached
      .get_contributors(1, Some("main"), TimeWindow::all())
      .await
      .unwrap();
    let b = direct
      .get_contributors(1, Some("main"), TimeWindow::all())
      .await
      .unwrap();
    assert_eq!(a, b);

    let branches = direct.get_branches(1, Some("true")).await.unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
  }

  #[tokio::test]
  async fn source_fallback_surfaces_unavailability() {
    let mut source = fixture();
    source.fail_commits = true;
    let q: QueryService<MemoryStore, StubSource> = QueryService::new(None, Arc::new(source));

    let err = q
      .get_commits(1, Some("main"), None, None, TimeWindow::all())
      .await
      .unwrap_err();
    assert!(matches!(err, QueryError::SourceUnavailable(_)));
  }
}
