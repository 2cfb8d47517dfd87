use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::document::{
    lookup, project, Document, DocumentId, Filter, FindOptions, IndexOptions, StoredDocument,
};
use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentCollection, DocumentStore};

/// In-memory document store.
///
/// Intended for tests and embedding. Collections are created on first use,
/// documents are held behind a `RwLock` per collection, and ids come from a
/// single counter shared by every collection so they increase in global
/// insertion order.
pub struct InMemoryDocumentStore {
    connected: AtomicBool,
    connection: RwLock<Option<StoreConfig>>,
    shared: Arc<Shared>,
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
}

struct Shared {
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transient("connection refused".into()));
        }
        Ok(())
    }
}

impl InMemoryDocumentStore {
    /// Create a new, unconnected, empty store.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            connection: RwLock::new(None),
            shared: Arc::new(Shared::new()),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Simulate the backend going away (or coming back). While unavailable
    /// every operation fails with a transient error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Settings of the most recent successful `connect`.
    pub fn connection_config(&self) -> Option<StoreConfig> {
        self.connection.read().expect("lock poisoned").clone()
    }

    /// Number of documents in the named collection (0 if it does not exist).
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Paths carrying a unique index in the named collection, sorted.
    pub fn unique_indexes(&self, collection: &str) -> Vec<String> {
        self.collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map(|c| c.unique_paths())
            .unwrap_or_default()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .collections
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("InMemoryDocumentStore")
            .field("connected", &self.is_connected())
            .field("collections", &names)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn connect(&self, config: &StoreConfig) -> StoreResult<()> {
        self.shared.check_available()?;
        *self.connection.write().expect("lock poisoned") = Some(config.clone());
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        if !self.is_connected() {
            return Err(StoreError::NotConnected);
        }
        let mut map = self.collections.write().expect("lock poisoned");
        let collection = map
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryCollection::new(name, self.shared.clone())));
        Ok(collection.clone())
    }
}

/// A single collection inside [`InMemoryDocumentStore`].
pub struct InMemoryCollection {
    name: String,
    shared: Arc<Shared>,
    state: RwLock<CollectionState>,
}

#[derive(Default)]
struct CollectionState {
    documents: BTreeMap<DocumentId, Document>,
    indexes: BTreeMap<String, IndexOptions>,
    /// Keys held by each unique index, in serialized JSON form.
    unique_keys: BTreeMap<String, HashSet<String>>,
}

/// Index key of `document` under `path`; documents without the path are
/// not indexed.
fn index_key(document: &Document, path: &str) -> Option<String> {
    lookup(document, path).map(Value::to_string)
}

impl CollectionState {
    /// Build the key set for a new unique index, or `None` on duplicates.
    fn collect_keys(&self, path: &str) -> Option<HashSet<String>> {
        let mut keys = HashSet::with_capacity(self.documents.len());
        for doc in self.documents.values() {
            if let Some(key) = index_key(doc, path) {
                if !keys.insert(key) {
                    return None;
                }
            }
        }
        Some(keys)
    }
}

impl InMemoryCollection {
    fn new(name: &str, shared: Arc<Shared>) -> Self {
        Self {
            name: name.to_string(),
            shared,
            state: RwLock::new(CollectionState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unique_paths(&self) -> Vec<String> {
        self.state
            .read()
            .expect("lock poisoned")
            .unique_keys
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> StoreResult<DocumentId> {
        self.shared.check_available()?;
        let mut state = self.state.write().expect("lock poisoned");

        let mut new_keys = Vec::new();
        for (path, keys) in &state.unique_keys {
            if let Some(key) = index_key(&document, path) {
                if keys.contains(&key) {
                    return Err(StoreError::Conflict(format!(
                        "collection: {} index: {path}_1 dup key: {{ {path}: {key} }}",
                        self.name
                    )));
                }
                new_keys.push((path.clone(), key));
            }
        }
        for (path, key) in new_keys {
            if let Some(keys) = state.unique_keys.get_mut(&path) {
                keys.insert(key);
            }
        }

        // Allocated under the collection write lock, so ids within a
        // collection are strictly increasing in commit order.
        let id = DocumentId::new(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        state.documents.insert(id, document);
        Ok(id)
    }

    async fn find(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<StoredDocument>> {
        self.shared.check_available()?;
        let state = self.state.read().expect("lock poisoned");

        let lower = match options.after {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        let limit = options.limit.unwrap_or(usize::MAX);

        Ok(state
            .documents
            .range((lower, Bound::Unbounded))
            .filter(|(_, doc)| filter.matches(doc))
            .take(limit)
            .map(|(id, doc)| StoredDocument {
                id: *id,
                body: match &options.projection {
                    Some(paths) => project(doc, paths),
                    None => doc.clone(),
                },
            })
            .collect())
    }

    async fn create_index(&self, path: &str, options: IndexOptions) -> StoreResult<()> {
        self.shared.check_available()?;
        let mut state = self.state.write().expect("lock poisoned");

        if let Some(existing) = state.indexes.get(path) {
            if *existing == options {
                return Ok(());
            }
            return Err(StoreError::Fatal(format!(
                "index {path}_1 already exists with different options"
            )));
        }
        if options.unique {
            let keys = state.collect_keys(path).ok_or_else(|| {
                StoreError::Fatal(format!(
                    "cannot build unique index {path}_1 on {}: duplicate keys present",
                    self.name
                ))
            })?;
            state.unique_keys.insert(path.to_string(), keys);
        }
        state.indexes.insert(path.to_string(), options);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn connected() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        store.connect(&StoreConfig::default()).await.unwrap();
        store
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn collection_before_connect_fails() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(
            store.collection("commits").err(),
            Some(StoreError::NotConnected)
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let store = connected().await;
        store.connect(&StoreConfig::default()).await.unwrap();
        assert!(store.is_connected());
    }

    #[tokio::test]
    async fn connect_records_driver_settings() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.connection_config(), None);

        let mut config = StoreConfig {
            url: "mongodb://db.internal:27017".into(),
            database_id: "hub-prod".into(),
            ..StoreConfig::default()
        };
        config.client_options.insert("maxPoolSize".into(), json!(20));
        store.connect(&config).await.unwrap();

        let seen = store.connection_config().unwrap();
        assert_eq!(seen.url, "mongodb://db.internal:27017");
        assert_eq!(seen.database_id, "hub-prod");
        assert_eq!(seen.client_options["maxPoolSize"], json!(20));
    }

    #[tokio::test]
    async fn unavailable_store_fails_transiently() {
        let store = InMemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(store.connect(&StoreConfig::default()).await.unwrap_err().is_transient());

        store.set_unavailable(false);
        store.connect(&StoreConfig::default()).await.unwrap();
        let commits = store.collection("commits").unwrap();
        store.set_unavailable(true);
        let err = commits.insert_one(doc(json!({ "rev": "a1" }))).await.unwrap_err();
        assert!(err.is_transient());
    }

    // -----------------------------------------------------------------------
    // Insert / find
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn ids_increase_across_collections() {
        let store = connected().await;
        let a = store.collection("a").unwrap();
        let b = store.collection("b").unwrap();
        let id1 = a.insert_one(doc(json!({ "n": 1 }))).await.unwrap();
        let id2 = b.insert_one(doc(json!({ "n": 2 }))).await.unwrap();
        let id3 = a.insert_one(doc(json!({ "n": 3 }))).await.unwrap();
        assert!(id1 < id2 && id2 < id3);
        assert_eq!(store.document_count("a"), 2);
        assert_eq!(store.document_count("missing"), 0);
    }

    #[tokio::test]
    async fn find_filters_sorts_and_limits() {
        let store = connected().await;
        let c = store.collection("commits").unwrap();
        for n in 0..10 {
            let owner = if n % 2 == 0 { "even" } else { "odd" };
            c.insert_one(doc(json!({ "owner": owner, "n": n }))).await.unwrap();
        }

        let filter = Filter::new().eq("owner", "even");
        let page = c.find(&filter, &FindOptions::default().limit(3)).await.unwrap();
        let ns: Vec<i64> = page.iter().map(|d| d.body["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![0, 2, 4]);

        let rest = c
            .find(&filter, &FindOptions::default().after(Some(page[2].id)))
            .await
            .unwrap();
        let ns: Vec<i64> = rest.iter().map(|d| d.body["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![6, 8]);
    }

    #[tokio::test]
    async fn find_applies_projection() {
        let store = connected().await;
        let c = store.collection("commits").unwrap();
        c.insert_one(doc(json!({ "rev": "a1", "owner": "o" }))).await.unwrap();
        let found = c
            .find(&Filter::new(), &FindOptions::default().project(&["rev"]))
            .await
            .unwrap();
        assert_eq!(Value::Object(found[0].body.clone()), json!({ "rev": "a1" }));
    }

    // -----------------------------------------------------------------------
    // Unique indexes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unique_index_rejects_duplicates_as_conflict() {
        let store = connected().await;
        let c = store.collection("commits").unwrap();
        c.create_index("rev", IndexOptions::unique()).await.unwrap();

        c.insert_one(doc(json!({ "rev": "a1" }))).await.unwrap();
        let err = c.insert_one(doc(json!({ "rev": "a1" }))).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(c.find(&Filter::new(), &FindOptions::default()).await.unwrap().len(), 1);

        // Documents lacking the key are not indexed.
        c.insert_one(doc(json!({ "other": 1 }))).await.unwrap();
        c.insert_one(doc(json!({ "other": 2 }))).await.unwrap();
    }

    #[tokio::test]
    async fn unique_keys_are_tracked_per_insert() {
        let c = InMemoryCollection::new("commits", Arc::new(Shared::new()));
        c.insert_one(doc(json!({ "rev": "early" }))).await.unwrap();
        c.create_index("rev", IndexOptions::unique()).await.unwrap();

        for n in 0..2_000 {
            c.insert_one(doc(json!({ "rev": format!("{n:x}") }))).await.unwrap();
        }
        c.insert_one(doc(json!({ "other": true }))).await.unwrap();

        let state = c.state.read().unwrap();
        let keys = &state.unique_keys["rev"];
        assert_eq!(keys.len(), 2_001);
        assert!(keys.contains("\"early\""));
        drop(state);

        let err = c.insert_one(doc(json!({ "rev": "7cf" }))).await.unwrap_err();
        assert!(err.is_conflict());
        // Values are keyed by JSON form, so a number never collides with a string.
        c.insert_one(doc(json!({ "rev": 10 }))).await.unwrap();
        let err = c.insert_one(doc(json!({ "rev": "a" }))).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(c.len(), 2_003);
    }

    #[tokio::test]
    async fn create_index_is_idempotent() {
        let store = connected().await;
        let c = store.collection("objects").unwrap();
        c.create_index("object_id", IndexOptions::unique()).await.unwrap();
        c.create_index("object_id", IndexOptions::unique()).await.unwrap();
        assert_eq!(store.unique_indexes("objects"), vec!["object_id".to_string()]);

        let err = c
            .create_index("object_id", IndexOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Fatal(_)));
    }

    #[tokio::test]
    async fn unique_index_over_duplicates_fails() {
        let store = connected().await;
        let c = store.collection("objects").unwrap();
        c.insert_one(doc(json!({ "object_id": "x" }))).await.unwrap();
        c.insert_one(doc(json!({ "object_id": "x" }))).await.unwrap();
        let err = c
            .create_index("object_id", IndexOptions::unique())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Fatal(_)));
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_converge() {
        let store = Arc::new(connected().await);
        let c = store.collection("commits").unwrap();
        c.create_index("rev", IndexOptions::unique()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                c.insert_one(doc(json!({ "rev": "same" }))).await
            }));
        }
        let mut inserted = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => inserted += 1,
                Err(e) => assert!(e.is_conflict()),
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.document_count("commits"), 1);
    }
}
