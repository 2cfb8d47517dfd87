//! Shared test fixtures.

use hub_store::{HubCollections, InMemoryDocumentStore, StoreConfig};
use hub_types::{encode_protected, Commit, CommitEnvelope, CommitHeaders};

use crate::bootstrap;

pub const ALICE: &str = "did:example:alice";
pub const BOB: &str = "did:example:bob";
pub const SIGNATURE: &str = "c2lnbmF0dXJl";
pub const PAYLOAD: &str = "eyJuYW1lIjoiUm9hZCB0cmlwIn0";

/// A commit signed by Alice for her own hub.
pub fn commit(rev: &str, object_id: &str, operation: &str) -> Commit {
    commit_for(ALICE, rev, object_id, operation)
}

/// A commit whose issuer and subject are both `owner`.
pub fn commit_for(owner: &str, rev: &str, object_id: &str, operation: &str) -> Commit {
    let headers = CommitHeaders {
        interface: "Collections".into(),
        context: "https://schema.org".into(),
        object_type: "MusicPlaylist".into(),
        operation: operation.into(),
        committed_at: "2019-01-01T00:00:00Z".into(),
        commit_strategy: "basic".into(),
        iss: owner.into(),
        sub: owner.into(),
        kid: format!("{owner}#key-1"),
        object_id: Some(object_id.into()),
        rev: Some(rev.into()),
    };
    let envelope = CommitEnvelope {
        protected: encode_protected(&headers).unwrap(),
        header: None,
        payload: Some(PAYLOAD.into()),
        signature: SIGNATURE.into(),
    };
    Commit::new(envelope, headers)
}

/// Collections over a fresh in-memory store, connected and indexed.
pub async fn initialized() -> HubCollections<InMemoryDocumentStore> {
    let hub = HubCollections::new(InMemoryDocumentStore::new(), StoreConfig::default());
    bootstrap::initialize(&hub).await.unwrap();
    hub
}
