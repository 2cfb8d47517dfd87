use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator stored on every document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Commit,
    Object,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit metadata copied out of the protected header for indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFields {
    pub interface: String,
    pub context: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub operation: String,
    pub committed_at: String,
    pub commit_strategy: String,
    pub iss: String,
    pub sub: String,
    pub kid: String,
}

/// A single commit as persisted in the commit collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommit {
    pub kind: RecordKind,
    pub rev: String,
    pub object_id: String,
    pub owner: String,
    pub fields: CommitFields,
    /// The signed envelope, kept verbatim.
    pub commit: Value,
}

/// Object metadata returned through the query API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub interface: String,
    pub context: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    pub created_at: String,
    pub created_by: String,
    pub commit_strategy: String,
    pub sub: String,
}

/// Object cache entry, written once from an object's creation commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub kind: RecordKind,
    pub object_id: String,
    pub owner: String,
    pub fields: ObjectMetadata,
}
