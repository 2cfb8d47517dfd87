/// Provider error codes that signal a unique-index violation.
pub const DUPLICATE_KEY_CODES: [i32; 2] = [11000, 11001];

/// Provider error codes for failures that may succeed when retried
/// (host unreachable, network timeout, primary stepping down, shutdown).
pub const TRANSIENT_CODES: [i32; 9] = [6, 7, 89, 91, 189, 10107, 11600, 11602, 13435];

/// Errors from document store operations.
///
/// Adapters classify provider failures into these kinds; callers never
/// inspect provider-native error shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write because the key already exists.
    #[error("duplicate key: {0}")]
    Conflict(String),

    /// The backend was unreachable or interrupted.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Fatal(String),

    /// A collection was requested before the store connected.
    #[error("store is not connected")]
    NotConnected,

    /// A document id could not be parsed.
    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),

    /// Store configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Classify a provider error by its numeric code.
    pub fn from_provider_code(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        if DUPLICATE_KEY_CODES.contains(&code) {
            Self::Conflict(message)
        } else if TRANSIENT_CODES.contains(&code) {
            Self::Transient(message)
        } else {
            Self::Fatal(format!("code {code}: {message}"))
        }
    }

    /// Returns `true` for unique-index violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
