use std::sync::Arc;

use async_trait::async_trait;

use hub_store::{DocumentStore, HubCollections, StoreConfig, StoreResult};
use hub_types::{
    Commit, CommitDeserializer, CommitRequest, CommitResponse, HubResult, JwsCommitDeserializer,
    ObjectMetadata, QueryRequest, QueryResponse,
};

use crate::{bootstrap, ingest, query};

/// Persistence surface the hub host calls into.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connect and create the indexes ingestion depends on.
    async fn initialize(&self) -> HubResult<()>;

    /// Record a commit and return every known revision of its object.
    async fn commit(&self, request: &CommitRequest) -> HubResult<CommitResponse>;

    async fn query_objects(
        &self,
        request: &QueryRequest,
    ) -> HubResult<QueryResponse<ObjectMetadata>>;

    async fn query_commits(&self, request: &QueryRequest) -> HubResult<QueryResponse<Commit>>;
}

/// [`Store`] backed by a document database.
pub struct HubStore<S> {
    collections: HubCollections<S>,
    deserializer: Arc<dyn CommitDeserializer>,
}

impl<S: DocumentStore> HubStore<S> {
    /// Build a store over `backend`. The configuration is validated here; no
    /// connection is made until [`Store::initialize`].
    pub fn new(backend: S, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            collections: HubCollections::new(backend, config),
            deserializer: Arc::new(JwsCommitDeserializer),
        })
    }

    /// Replace the deserializer used to rebuild commits in query results.
    pub fn with_deserializer(mut self, deserializer: Arc<dyn CommitDeserializer>) -> Self {
        self.deserializer = deserializer;
        self
    }

    pub fn collections(&self) -> &HubCollections<S> {
        &self.collections
    }
}

#[async_trait]
impl<S: DocumentStore> Store for HubStore<S> {
    async fn initialize(&self) -> HubResult<()> {
        bootstrap::initialize(&self.collections).await
    }

    async fn commit(&self, request: &CommitRequest) -> HubResult<CommitResponse> {
        ingest::submit_commit(&self.collections, request).await
    }

    async fn query_objects(
        &self,
        request: &QueryRequest,
    ) -> HubResult<QueryResponse<ObjectMetadata>> {
        query::query_objects(&self.collections, request).await
    }

    async fn query_commits(&self, request: &QueryRequest) -> HubResult<QueryResponse<Commit>> {
        query::query_commits(&self.collections, self.deserializer.as_ref(), request).await
    }
}
