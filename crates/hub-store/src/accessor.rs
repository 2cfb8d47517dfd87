use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentCollection, DocumentStore};

/// Owns the store connection and the two hub collections.
///
/// Handles are resolved once, on the first successful `connect()`, and shared
/// read-only afterwards.
pub struct HubCollections<S> {
    store: S,
    config: StoreConfig,
    handles: OnceLock<Handles>,
}

struct Handles {
    commits: Arc<dyn DocumentCollection>,
    objects: Arc<dyn DocumentCollection>,
}

impl<S: DocumentStore> HubCollections<S> {
    pub fn new(store: S, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            handles: OnceLock::new(),
        }
    }

    /// Connect to the store and resolve both collections. Safe to repeat.
    pub async fn connect(&self) -> StoreResult<()> {
        if self.handles.get().is_some() {
            return Ok(());
        }

        self.store.connect(&self.config).await?;
        let handles = Handles {
            commits: self.store.collection(&self.config.commit_collection_id)?,
            objects: self.store.collection(&self.config.object_collection_id)?,
        };
        // A concurrent connect may have won; its handles are equivalent.
        let _ = self.handles.set(handles);

        info!(
            url = %self.config.url,
            database = %self.config.database_id,
            commits = %self.config.commit_collection_id,
            objects = %self.config.object_collection_id,
            "connected to document store"
        );
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.handles.get().is_some()
    }

    /// Collection holding commit documents.
    pub fn commit_collection(&self) -> StoreResult<Arc<dyn DocumentCollection>> {
        self.handles
            .get()
            .map(|h| h.commits.clone())
            .ok_or(StoreError::NotConnected)
    }

    /// Collection holding object cache documents.
    pub fn object_collection(&self) -> StoreResult<Arc<dyn DocumentCollection>> {
        self.handles
            .get()
            .map(|h| h.objects.clone())
            .ok_or(StoreError::NotConnected)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl<S> std::fmt::Debug for HubCollections<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubCollections")
            .field("commits", &self.config.commit_collection_id)
            .field("objects", &self.config.object_collection_id)
            .field("connected", &self.handles.get().is_some())
            .finish()
    }
}
