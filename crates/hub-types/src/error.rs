use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Developer message returned for every backing-store failure.
///
/// Provider details are logged by the caller and never included here.
pub const STORAGE_ERROR_MESSAGE: &str = "An internal storage error occurred.";

/// Error class reported back to the hub host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubErrorCode {
    BadRequest,
    ServerError,
}

impl std::fmt::Display for HubErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest => write!(f, "bad_request"),
            Self::ServerError => write!(f, "server_error"),
        }
    }
}

/// Errors surfaced to the hub host by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Caller-supplied data was rejected.
    #[error("bad request: {}", summarize(.property, .message))]
    BadRequest {
        /// Dotted path of the offending property, when known.
        property: Option<String>,
        /// Developer-facing explanation.
        message: Option<String>,
    },

    /// The request could not be completed for reasons outside the caller's control.
    #[error("server error: {message}")]
    ServerError { message: String },
}

impl HubError {
    /// Bad request pointing at a specific property path.
    pub fn invalid_property(property: impl Into<String>) -> Self {
        Self::BadRequest {
            property: Some(property.into()),
            message: None,
        }
    }

    /// Bad request pointing at a property, with an explanation.
    pub fn invalid_property_with(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            property: Some(property.into()),
            message: Some(message.into()),
        }
    }

    /// Bad request carrying only a developer message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            property: None,
            message: Some(message.into()),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    /// The opaque error used for any backing-store failure.
    pub fn storage() -> Self {
        Self::server(STORAGE_ERROR_MESSAGE)
    }

    pub fn code(&self) -> HubErrorCode {
        match self {
            Self::BadRequest { .. } => HubErrorCode::BadRequest,
            Self::ServerError { .. } => HubErrorCode::ServerError,
        }
    }

    /// The offending property path, if this is a bad request that names one.
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::BadRequest { property, .. } => property.as_deref(),
            Self::ServerError { .. } => None,
        }
    }

    pub fn developer_message(&self) -> Option<&str> {
        match self {
            Self::BadRequest { message, .. } => message.as_deref(),
            Self::ServerError { message } => Some(message),
        }
    }
}

fn summarize<'a>(property: &'a Option<String>, message: &'a Option<String>) -> &'a str {
    message
        .as_deref()
        .or(property.as_deref())
        .unwrap_or("invalid request")
}

/// Result alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors produced while decoding host types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid base64url: {0}")]
    InvalidBase64(String),

    #[error("invalid protected header: {0}")]
    InvalidHeader(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
