use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// Hub interface a commit belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interface {
    Profile,
    Permissions,
    Actions,
    Collections,
    Stores,
}

impl Interface {
    pub const ALL: [Interface; 5] = [
        Self::Profile,
        Self::Permissions,
        Self::Actions,
        Self::Collections,
        Self::Stores,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Permissions => "Permissions",
            Self::Actions => "Actions",
            Self::Collections => "Collections",
            Self::Stores => "Stores",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation a commit performs on its object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Self::Create, Self::Update, Self::Delete];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| TypeError::InvalidHeader(format!("unknown operation '{s}'")))
    }
}

/// Protected header fields of a signed commit.
///
/// Values are kept as the raw strings the signer produced; the store's
/// validation decides whether they are acceptable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeaders {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

impl CommitHeaders {
    /// The declared operation, if it is one the hub knows.
    pub fn operation(&self) -> Option<Operation> {
        self.operation.parse().ok()
    }

    /// Returns `true` when the header declares a `create` operation.
    pub fn is_create(&self) -> bool {
        self.operation() == Some(Operation::Create)
    }
}

/// The flattened JWS a commit travels in.
///
/// The store keeps this verbatim and never looks inside `payload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEnvelope {
    pub protected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub signature: String,
}

/// A signed commit as seen by the hub host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    envelope: CommitEnvelope,
    headers: CommitHeaders,
}

impl Commit {
    /// Pair an envelope with headers the host has already decoded.
    pub fn new(envelope: CommitEnvelope, headers: CommitHeaders) -> Self {
        Self { envelope, headers }
    }

    /// Decode the protected header of `envelope` and fill in the revision.
    ///
    /// A header without `rev` gets the BLAKE3 revision of the signed
    /// content; a `create` header without `object_id` gets its own revision.
    pub fn from_envelope(envelope: CommitEnvelope) -> Result<Self, TypeError> {
        let raw = URL_SAFE_NO_PAD
            .decode(envelope.protected.trim_end_matches('='))
            .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
        let mut headers: CommitHeaders =
            serde_json::from_slice(&raw).map_err(|e| TypeError::InvalidHeader(e.to_string()))?;

        if headers.rev.is_none() {
            headers.rev = Some(compute_revision(
                &envelope.protected,
                envelope.payload.as_deref().unwrap_or_default(),
            ));
        }
        if headers.object_id.is_none() && headers.is_create() {
            headers.object_id = headers.rev.clone();
        }

        Ok(Self { envelope, headers })
    }

    pub fn headers(&self) -> &CommitHeaders {
        &self.headers
    }

    pub fn envelope(&self) -> &CommitEnvelope {
        &self.envelope
    }

    /// The revision id, if the host assigned one.
    pub fn revision(&self) -> Option<&str> {
        self.headers.rev.as_deref()
    }

    /// JSON form of the signed envelope, as stored.
    pub fn to_json(&self) -> Result<Value, TypeError> {
        serde_json::to_value(&self.envelope).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}

impl Serialize for Commit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.envelope.serialize(serializer)
    }
}

/// Lowercase-hex BLAKE3 revision of a commit's signed content
/// (`protected`, `.`, `payload`).
///
/// This is the fallback used by [`JwsCommitDeserializer`] for headers that
/// carry no `rev`. It is not guaranteed to match the revision scheme of any
/// particular hub host.
pub fn compute_revision(protected: &str, payload: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(protected.as_bytes());
    hasher.update(b".");
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Encode a header map as a base64url protected header.
pub fn encode_protected(headers: &CommitHeaders) -> Result<String, TypeError> {
    let json = serde_json::to_vec(headers).map_err(|e| TypeError::Serialization(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Turns a stored commit payload back into a host [`Commit`].
pub trait CommitDeserializer: Send + Sync {
    fn deserialize(&self, stored: &Value) -> Result<Commit, TypeError>;
}

/// Deserializer for flattened-JSON JWS commits.
///
/// This is the default used by the store and can be replaced by the host.
/// Revisions present in the protected header are taken as-is; a missing one
/// is derived with [`compute_revision`], which hosts with their own revision
/// algorithm must not rely on. Such hosts should supply their own
/// [`CommitDeserializer`] so that queried commits carry the revisions they
/// were submitted under.
#[derive(Clone, Copy, Debug, Default)]
pub struct JwsCommitDeserializer;

impl CommitDeserializer for JwsCommitDeserializer {
    fn deserialize(&self, stored: &Value) -> Result<Commit, TypeError> {
        let envelope: CommitEnvelope = serde_json::from_value(stored.clone())
            .map_err(|e| TypeError::Serialization(e.to_string()))?;
        Commit::from_envelope(envelope)
    }
}
