//! Host-facing types for the identity hub document store.
//!
//! Every other hub crate depends on `hub-types`.
//!
//! # Key Types
//!
//! - [`Commit`] -- A signed commit with its decoded protected headers
//! - [`CommitDeserializer`] -- Rebuilds a [`Commit`] from its stored JSON form
//! - [`StoredCommit`] / [`StoredObject`] -- Documents persisted by the store
//! - [`QueryRequest`] / [`QueryResponse`] -- Paginated, filtered queries
//! - [`HubError`] -- Error taxonomy reported back to the hub host

pub mod commit;
pub mod error;
pub mod query;
pub mod records;

pub use commit::{
    compute_revision, encode_protected, Commit, CommitDeserializer, CommitEnvelope, CommitHeaders,
    Interface, JwsCommitDeserializer, Operation,
};
pub use error::{HubError, HubErrorCode, HubResult, TypeError, STORAGE_ERROR_MESSAGE};
pub use query::{
    CommitRequest, CommitResponse, FilterValue, Pagination, QueryFilter, QueryRequest,
    QueryResponse,
};
pub use records::{CommitFields, ObjectMetadata, RecordKind, StoredCommit, StoredObject};
