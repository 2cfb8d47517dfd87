//! Commit ingestion: validate, persist, derive the object cache entry, and
//! report every known revision of the affected object.
//!
//! Idempotency comes entirely from the unique indexes: a duplicate insert is
//! a commit (or object) that is already durable, so it counts as success.
//! The commit write and the object cache write are independent; if the
//! second fails the first is kept and a retry completes the pair.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use hub_store::{
    Document, DocumentCollection, DocumentStore, Filter, FindOptions, HubCollections, StoreError,
};
use hub_types::{
    Commit, CommitFields, CommitRequest, CommitResponse, HubError, HubResult, ObjectMetadata,
    RecordKind, StoredCommit, StoredObject,
};

use crate::error::{storage_failure, to_document};
use crate::validation::{validate_commit, validate_object};

/// Outcome of an idempotent insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Record a commit, and for creation commits its object cache entry.
pub async fn submit_commit<S: DocumentStore>(
    collections: &HubCollections<S>,
    request: &CommitRequest,
) -> HubResult<CommitResponse> {
    let stored = stored_commit(&request.commit)?;
    if let Err(e) = validate_commit(&stored) {
        warn!(rev = %stored.rev, error = %e, "rejected commit");
        return Err(e);
    }

    let commits = collections
        .commit_collection()
        .map_err(|e| storage_failure("resolve commit collection", e))?;
    debug!(rev = %stored.rev, "storing commit");
    insert_idempotent(
        &commits,
        to_document("commit", &stored)?,
        RecordKind::Commit,
        &stored.rev,
    )
    .await?;

    if request.commit.headers().is_create() {
        add_object_cache(collections, &request.owner, &request.commit).await?;
    }

    let known_revisions = known_revisions(collections, &stored.owner, &stored.object_id).await?;
    if known_revisions.is_empty() {
        // A concurrent writer or a lagging replica can briefly hide the
        // commit that was just confirmed durable.
        warn!(
            rev = %stored.rev,
            object_id = %stored.object_id,
            "no known revisions found after storing commit"
        );
    }

    Ok(CommitResponse { known_revisions })
}

/// Add the object cache entry for a creation commit.
pub async fn add_object_cache<S: DocumentStore>(
    collections: &HubCollections<S>,
    owner: &str,
    commit: &Commit,
) -> HubResult<InsertOutcome> {
    let stored = stored_object(owner, commit);
    if let Err(e) = validate_object(&stored) {
        warn!(object_id = %stored.object_id, error = %e, "rejected object cache entry");
        return Err(e);
    }

    let objects = collections
        .object_collection()
        .map_err(|e| storage_failure("resolve object collection", e))?;
    debug!(object_id = %stored.object_id, "adding object cache entry");
    insert_idempotent(
        &objects,
        to_document("object", &stored)?,
        RecordKind::Object,
        &stored.object_id,
    )
    .await
}

/// All revisions stored for `(owner, object_id)`.
///
/// Callers must not rely on the order of the returned revisions.
pub async fn known_revisions<S: DocumentStore>(
    collections: &HubCollections<S>,
    owner: &str,
    object_id: &str,
) -> HubResult<Vec<String>> {
    let commits = collections
        .commit_collection()
        .map_err(|e| storage_failure("resolve commit collection", e))?;
    let filter = Filter::new()
        .eq("owner", owner)
        .eq("object_id", object_id);
    let found = commits
        .find(&filter, &FindOptions::default().project(&["rev"]))
        .await
        .map_err(|e| storage_failure("find known revisions", e))?;

    let revisions: Vec<String> = found
        .iter()
        .filter_map(|doc| doc.body.get("rev").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect();
    debug!(
        %object_id,
        count = revisions.len(),
        revisions = ?revisions,
        "found known revisions"
    );
    Ok(revisions)
}

async fn insert_idempotent(
    collection: &Arc<dyn DocumentCollection>,
    document: Document,
    kind: RecordKind,
    key: &str,
) -> HubResult<InsertOutcome> {
    match collection.insert_one(document).await {
        Ok(id) => {
            info!(kind = %kind, key, document_id = %id, "stored document");
            Ok(InsertOutcome::Inserted)
        }
        Err(StoreError::Conflict(detail)) => {
            info!(kind = %kind, key, %detail, "document already exists, treating as success");
            Ok(InsertOutcome::AlreadyPresent)
        }
        Err(e) => {
            let operation = match kind {
                RecordKind::Commit => "insert commit",
                RecordKind::Object => "insert object",
            };
            Err(storage_failure(operation, e))
        }
    }
}

/// Build the commit document for a host commit.
///
/// Missing revision or object id headers become empty strings, which the
/// schema then rejects with the matching property path.
pub fn stored_commit(commit: &Commit) -> HubResult<StoredCommit> {
    let headers = commit.headers();
    let envelope = commit.to_json().map_err(|e| {
        error!(error = %e, "could not serialize commit envelope");
        HubError::server("Error serializing commit data.")
    })?;

    Ok(StoredCommit {
        kind: RecordKind::Commit,
        rev: headers.rev.clone().unwrap_or_default(),
        object_id: headers.object_id.clone().unwrap_or_default(),
        owner: headers.sub.clone(),
        fields: CommitFields {
            interface: headers.interface.clone(),
            context: headers.context.clone(),
            object_type: headers.object_type.clone(),
            operation: headers.operation.clone(),
            committed_at: headers.committed_at.clone(),
            commit_strategy: headers.commit_strategy.clone(),
            iss: headers.iss.clone(),
            sub: headers.sub.clone(),
            kid: headers.kid.clone(),
        },
        commit: envelope,
    })
}

/// Build the object cache document for a creation commit owned by `owner`.
pub fn stored_object(owner: &str, commit: &Commit) -> StoredObject {
    let headers = commit.headers();
    let rev = headers.rev.clone().unwrap_or_default();

    StoredObject {
        kind: RecordKind::Object,
        object_id: rev.clone(),
        owner: owner.to_string(),
        fields: ObjectMetadata {
            interface: headers.interface.clone(),
            context: headers.context.clone(),
            object_type: headers.object_type.clone(),
            id: rev,
            created_at: headers.committed_at.clone(),
            created_by: headers.iss.clone(),
            commit_strategy: headers.commit_strategy.clone(),
            sub: headers.sub.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, ALICE, BOB};
    use async_trait::async_trait;
    use hub_store::{
        DocumentId, IndexOptions, InMemoryDocumentStore, StoreConfig, StoreResult, StoredDocument,
    };
    use hub_types::{HubErrorCode, STORAGE_ERROR_MESSAGE};

    /// Backend whose reads lag behind its writes: every `find` is empty.
    #[derive(Default)]
    struct LaggingStore {
        inner: InMemoryDocumentStore,
    }

    struct LaggingCollection {
        inner: Arc<dyn DocumentCollection>,
    }

    #[async_trait]
    impl DocumentStore for LaggingStore {
        async fn connect(&self, config: &StoreConfig) -> StoreResult<()> {
            self.inner.connect(config).await
        }

        fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
            let inner = self.inner.collection(name)?;
            Ok(Arc::new(LaggingCollection { inner }))
        }
    }

    #[async_trait]
    impl DocumentCollection for LaggingCollection {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn insert_one(&self, document: Document) -> StoreResult<DocumentId> {
            self.inner.insert_one(document).await
        }

        async fn find(
            &self,
            _filter: &Filter,
            _options: &FindOptions,
        ) -> StoreResult<Vec<StoredDocument>> {
            Ok(Vec::new())
        }

        async fn create_index(&self, path: &str, options: IndexOptions) -> StoreResult<()> {
            self.inner.create_index(path, options).await
        }
    }

    fn request(rev: &str, object_id: &str, operation: &str) -> CommitRequest {
        CommitRequest {
            owner: ALICE.into(),
            commit: fixtures::commit(rev, object_id, operation),
        }
    }

    fn sorted(mut revs: Vec<String>) -> Vec<String> {
        revs.sort();
        revs
    }

    fn count(hub: &HubCollections<InMemoryDocumentStore>) -> (usize, usize) {
        (
            hub.store().document_count("commits"),
            hub.store().document_count("objects"),
        )
    }

    // -----------------------------------------------------------------------
    // Derivation
    // -----------------------------------------------------------------------

    #[test]
    fn object_entry_is_derived_from_create_commit() {
        let commit = fixtures::commit("abc123", "abc123", "create");
        let object = stored_object(ALICE, &commit);
        assert_eq!(object.object_id, "abc123");
        assert_eq!(object.fields.id, "abc123");
        assert_eq!(object.fields.created_at, commit.headers().committed_at);
        assert_eq!(object.fields.created_by, commit.headers().iss);
        assert_eq!(object.owner, ALICE);
    }

    #[test]
    fn commit_owner_comes_from_subject() {
        let stored = stored_commit(&fixtures::commit("abc123", "abc123", "create")).unwrap();
        assert_eq!(stored.owner, stored.fields.sub);
        assert_eq!(stored.kind, RecordKind::Commit);
        assert_eq!(stored.commit["signature"], fixtures::SIGNATURE);
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_commit_stores_commit_and_object() {
        let hub = fixtures::initialized().await;
        let response = submit_commit(&hub, &request("abc123", "abc123", "create"))
            .await
            .unwrap();
        assert_eq!(response.known_revisions, vec!["abc123".to_string()]);
        assert_eq!(count(&hub), (1, 1));
    }

    #[tokio::test]
    async fn update_commit_does_not_touch_object_cache() {
        let hub = fixtures::initialized().await;
        submit_commit(&hub, &request("abc123", "abc123", "create")).await.unwrap();
        let response = submit_commit(&hub, &request("def456", "abc123", "update"))
            .await
            .unwrap();
        assert_eq!(
            sorted(response.known_revisions),
            vec!["abc123".to_string(), "def456".to_string()]
        );
        assert_eq!(count(&hub), (2, 1));
    }

    #[tokio::test]
    async fn resubmission_is_a_no_op() {
        let hub = fixtures::initialized().await;
        let first = submit_commit(&hub, &request("abc123", "abc123", "create")).await.unwrap();
        let second = submit_commit(&hub, &request("abc123", "abc123", "create")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(count(&hub), (1, 1));
    }

    #[tokio::test]
    async fn known_revisions_cover_any_submission_order() {
        let hub = fixtures::initialized().await;
        for rev in ["c3", "a1", "b2", "a1", "c3"] {
            submit_commit(&hub, &request(rev, "abc123", "update")).await.unwrap();
        }
        let response = submit_commit(&hub, &request("d4", "abc123", "delete"))
            .await
            .unwrap();
        assert_eq!(
            sorted(response.known_revisions),
            vec!["a1", "b2", "c3", "d4"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn known_revisions_are_scoped_to_owner() {
        let hub = fixtures::initialized().await;
        submit_commit(&hub, &request("abc123", "abc123", "create")).await.unwrap();

        let bob = CommitRequest {
            owner: BOB.into(),
            commit: fixtures::commit_for(BOB, "fed987", "abc123", "update"),
        };
        let response = submit_commit(&hub, &bob).await.unwrap();
        assert_eq!(response.known_revisions, vec!["fed987".to_string()]);
    }

    #[tokio::test]
    async fn invalid_commit_writes_nothing() {
        let hub = fixtures::initialized().await;
        let err = submit_commit(&hub, &request("abc123", "def456", "create"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), HubErrorCode::BadRequest);
        assert_eq!(count(&hub), (0, 0));
    }

    #[tokio::test]
    async fn invalid_object_keeps_stored_commit() {
        let hub = fixtures::initialized().await;
        // Commit owner is Alice but the request claims Bob's hub: the commit
        // itself is valid, the derived cache entry is not.
        let req = CommitRequest {
            owner: BOB.into(),
            commit: fixtures::commit("abc123", "abc123", "create"),
        };
        let err = submit_commit(&hub, &req).await.unwrap_err();
        assert_eq!(
            err.developer_message(),
            Some("The object 'owner' and 'fields.sub' fields must match.")
        );
        assert_eq!(count(&hub), (1, 0));

        // Retrying with the right owner completes the pair.
        submit_commit(&hub, &request("abc123", "abc123", "create")).await.unwrap();
        assert_eq!(count(&hub), (1, 1));
    }

    #[tokio::test]
    async fn store_failure_is_opaque() {
        let hub = fixtures::initialized().await;
        hub.store().set_unavailable(true);
        let err = submit_commit(&hub, &request("abc123", "abc123", "create"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), HubErrorCode::ServerError);
        assert_eq!(err.developer_message(), Some(STORAGE_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn submit_before_initialize_is_server_error() {
        let hub = HubCollections::new(InMemoryDocumentStore::new(), Default::default());
        let err = submit_commit(&hub, &request("abc123", "abc123", "create"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), HubErrorCode::ServerError);
    }

    #[tokio::test]
    async fn unseen_revisions_return_empty_list() {
        let hub = HubCollections::new(LaggingStore::default(), StoreConfig::default());
        crate::bootstrap::initialize(&hub).await.unwrap();

        let response = submit_commit(&hub, &request("abc123", "abc123", "create"))
            .await
            .unwrap();
        assert_eq!(
            response,
            CommitResponse {
                known_revisions: vec![]
            }
        );
        assert_eq!(hub.store().inner.document_count("commits"), 1);
        assert_eq!(hub.store().inner.document_count("objects"), 1);
    }

    #[tokio::test]
    async fn duplicate_object_entry_is_already_present() {
        let hub = fixtures::initialized().await;
        let commit = fixtures::commit("abc123", "abc123", "create");
        assert_eq!(
            add_object_cache(&hub, ALICE, &commit).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            add_object_cache(&hub, ALICE, &commit).await.unwrap(),
            InsertOutcome::AlreadyPresent
        );
    }

    #[tokio::test]
    async fn concurrent_submissions_converge() {
        let hub = Arc::new(fixtures::initialized().await);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                submit_commit(&hub, &request("abc123", "abc123", "create")).await
            }));
        }
        for h in handles {
            let response = h.await.unwrap().unwrap();
            assert_eq!(response.known_revisions, vec!["abc123".to_string()]);
        }
        assert_eq!(count(&hub), (1, 1));
    }
}
