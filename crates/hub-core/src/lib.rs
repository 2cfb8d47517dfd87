//! Persistence core for the identity hub.
//!
//! This crate turns host commits into stored documents and back. It provides:
//! - Schema and cross-field validation of commit and object records
//! - Idempotent commit ingestion with object cache derivation
//! - Owner-scoped, filtered, cursor-paginated queries
//! - Index bootstrap
//! - The [`Store`] trait and its [`HubStore`] implementation

pub mod bootstrap;
mod error;
pub mod ingest;
pub mod query;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use bootstrap::initialize;
pub use ingest::{add_object_cache, known_revisions, submit_commit, InsertOutcome};
pub use query::{
    query_commits, query_objects, QuerySpec, COMMIT_FILTER_FIELDS, MAX_RESULTS_PER_PAGE,
    OBJECT_FILTER_FIELDS,
};
pub use store::{HubStore, Store};
pub use validation::{validate_commit, validate_object, Format};
