//! Document-store adapter for the identity hub.
//!
//! The hub persists two kinds of documents, commits and object cache
//! entries, in two named collections of an external document database. This
//! crate is the narrow boundary to that database.
//!
//! # Backends
//!
//! All backends implement the [`DocumentStore`] / [`DocumentCollection`]
//! traits:
//!
//! - [`InMemoryDocumentStore`] -- lock-protected store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Provider errors are classified at the adapter into [`StoreError`]
//!    kinds; callers never inspect provider-native codes.
//! 2. Unique-index violations always surface as [`StoreError::Conflict`].
//! 3. Document ids are assigned by the store and increase with insertion
//!    order; they are the only pagination key.
//! 4. The store never interprets document contents beyond filter paths.

pub mod accessor;
pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use accessor::HubCollections;
pub use config::StoreConfig;
pub use document::{
    Condition, Document, DocumentId, Filter, FindOptions, IndexOptions, StoredDocument,
};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryCollection, InMemoryDocumentStore};
pub use traits::{DocumentCollection, DocumentStore};
