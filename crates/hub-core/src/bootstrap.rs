use tracing::info;

use hub_store::{DocumentStore, HubCollections, IndexOptions};
use hub_types::HubResult;

use crate::error::storage_failure;

/// Unique key of the commit collection.
pub const COMMIT_KEY: &str = "rev";

/// Unique key of the object collection.
pub const OBJECT_KEY: &str = "object_id";

/// Connect and ensure both unique indexes exist.
///
/// Must complete before any commit is accepted: idempotent ingestion relies on
/// the indexes. Running it again against an initialized store changes
/// nothing.
pub async fn initialize<S: DocumentStore>(collections: &HubCollections<S>) -> HubResult<()> {
    collections
        .connect()
        .await
        .map_err(|e| storage_failure("connect", e))?;

    let commits = collections
        .commit_collection()
        .map_err(|e| storage_failure("resolve commit collection", e))?;
    commits
        .create_index(COMMIT_KEY, IndexOptions::unique())
        .await
        .map_err(|e| storage_failure("create commit index", e))?;

    let objects = collections
        .object_collection()
        .map_err(|e| storage_failure("resolve object collection", e))?;
    objects
        .create_index(OBJECT_KEY, IndexOptions::unique())
        .await
        .map_err(|e| storage_failure("create object index", e))?;

    info!(
        commits = commits.name(),
        objects = objects.name(),
        "document store initialized"
    );
    Ok(())
}
