//! Local mirror of a source-control management API.
//!
//! A background reconciler keeps projects, branches, commits, users and
//! groups synchronized into a cache store together with the secondary
//! indexes (commit timelines, membership and contributor sets, the email
//! to user-id map). [`query::QueryService`] answers time-windowed,
//! paginated and relation-filtered reads against the mirror, falling back
//! to the live source when no cache is configured.

pub mod config;
pub mod error;
pub mod hooks;
pub mod query;
pub mod resolver;
pub mod source;
pub mod store;
pub mod sync;
pub mod types;
pub mod window;

#[cfg(test)]
pub(crate) mod testutil;
