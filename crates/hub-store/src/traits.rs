use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::document::{Document, DocumentId, Filter, FindOptions, IndexOptions, StoredDocument};
use crate::error::StoreResult;

/// Connection to a backing document database.
///
/// This is the only seam that knows the database's wire protocol. All
/// implementations must satisfy these invariants:
/// - `connect()` may be called more than once.
/// - Provider errors are classified into [`StoreError`](crate::StoreError)
///   kinds; duplicate-key violations always surface as `Conflict`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish the connection described by `config`.
    ///
    /// `url`, `database_id` and `client_options` are handed to the driver
    /// unchanged; collection names are resolved later through
    /// [`collection`](Self::collection).
    async fn connect(&self, config: &StoreConfig) -> StoreResult<()>;

    /// Handle to the named collection.
    ///
    /// Returns `NotConnected` if called before `connect()` succeeded.
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>>;
}

/// A named collection of documents.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert a document and return the id the store assigned to it.
    ///
    /// Fails with `Conflict` if a unique index already holds the key.
    async fn insert_one(&self, document: Document) -> StoreResult<DocumentId>;

    /// Documents matching `filter`, sorted by ascending id.
    async fn find(&self, filter: &Filter, options: &FindOptions)
        -> StoreResult<Vec<StoredDocument>>;

    /// Create an index on a dotted path. Creating an identical index again
    /// is a no-op.
    async fn create_index(&self, path: &str, options: IndexOptions) -> StoreResult<()>;
}
