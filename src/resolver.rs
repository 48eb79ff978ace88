//! Commit author identity resolution.
//!
//! Maps an author email to a locally known user through the inverted
//! `email_owner` index that reconciliation maintains, instead of scanning
//! every `emails:*` set per lookup. Emails with no registered owner are
//! external contributors.

use crate::error::StoreError;
use crate::store::{get_as, CacheStore, RecordKind};
use crate::types::{Contributor, User};

pub struct ContributorResolver<'a, S: CacheStore> {
  store: &'a S,
}

impl<'a, S: CacheStore> ContributorResolver<'a, S> {
  pub fn new(store: &'a S) -> Self {
    Self { store }
  }

  pub fn resolve(&self, email: &str) -> Result<Contributor, StoreError> {
    match get_as::<u64>(self.store, RecordKind::EmailOwner, email)? {
      Some(id) => Ok(Contributor::User { id }),
      None => Ok(Contributor::External {
        email: email.to_string(),
      }),
    }
  }
}

/// Resolve against an in-memory user list; used on the source-direct
/// fallback path where no index exists.
pub fn resolve_among(users: &[User], email: &str) -> Contributor {
  for user in users {
    if user.emails.iter().any(|e| e == email) {
      return Contributor::User { id: user.id };
    }
  }
  Contributor::External {
    email: email.to_string(),
  }
}
