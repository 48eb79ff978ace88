//! Read access to the remote source-control management API.

pub mod api_types;
mod client;

pub use client::{drain_commits, drain_users, HttpSourceClient, SourceClient, PAGE_SIZE};
