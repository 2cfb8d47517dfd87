use serde::Serialize;
use tracing::error;

use hub_store::{Document, StoreError};
use hub_types::HubError;

/// Log a store failure and replace it with the opaque storage error.
///
/// Provider detail stays in the log; callers only ever see
/// [`HubError::storage`].
pub(crate) fn storage_failure(operation: &'static str, err: StoreError) -> HubError {
    error!(operation, error = %err, transient = err.is_transient(), "document store failure");
    HubError::storage()
}

/// Serialize a record into a store document.
pub(crate) fn to_document<T: Serialize>(
    kind: &'static str,
    record: &T,
) -> Result<Document, HubError> {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => {
            error!(kind, found = %other, "record did not serialize to a document");
            Err(HubError::server(format!("Error serializing {kind} data.")))
        }
        Err(e) => {
            error!(kind, error = %e, "record serialization failed");
            Err(HubError::server(format!("Error serializing {kind} data.")))
        }
    }
}
