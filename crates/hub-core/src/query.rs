//! Paginated, filtered queries over commits and object cache entries.

use serde_json::Value;
use tracing::{debug, error};

use hub_store::{
    Condition, DocumentId, DocumentStore, Filter, FindOptions, HubCollections, StoredDocument,
};
use hub_types::{
    Commit, CommitDeserializer, FilterValue, HubError, HubResult, ObjectMetadata, Pagination,
    QueryRequest, QueryResponse, RecordKind,
};

use crate::error::storage_failure;

/// Largest page a single query returns.
pub const MAX_RESULTS_PER_PAGE: usize = 100;

/// The only supported filter type.
pub const EQUALITY_FILTER: &str = "eq";

/// Filterable commit fields, mapped to their document paths.
pub const COMMIT_FILTER_FIELDS: &[(&str, &str)] = &[
    ("interface", "fields.interface"),
    ("context", "fields.context"),
    ("type", "fields.type"),
    ("object_id", "object_id"),
    ("rev", "rev"),
];

/// Filterable object fields, mapped to their document paths.
pub const OBJECT_FILTER_FIELDS: &[(&str, &str)] = &[
    ("interface", "fields.interface"),
    ("context", "fields.context"),
    ("type", "fields.type"),
    ("object_id", "object_id"),
];

/// A validated query, ready to run against one collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    filter: Filter,
    after: Option<DocumentId>,
}

impl QuerySpec {
    /// Fold the request's filters, in order, into a query over `kind`
    /// documents owned by the requester.
    ///
    /// Fails on the first filter naming a field outside `allowed` or a type
    /// other than equality. A later filter on the same field replaces an
    /// earlier one.
    pub fn build(
        kind: RecordKind,
        allowed: &[(&str, &str)],
        request: &QueryRequest,
    ) -> HubResult<Self> {
        if request.owner.is_empty() {
            return Err(HubError::invalid_property_with(
                "owner",
                "A query must specify an owner DID.",
            ));
        }

        let base = Filter::new()
            .eq("kind", kind.as_str())
            .eq("owner", request.owner.as_str());

        let filter = request
            .filters
            .iter()
            .enumerate()
            .try_fold(base, |filter, (i, f)| {
                let path = allowed
                    .iter()
                    .find(|(field, _)| *field == f.field)
                    .map(|(_, path)| *path)
                    .ok_or_else(|| {
                        HubError::invalid_property_with(
                            format!("filters[{i}].field"),
                            format!("Unsupported filter field '{}'.", f.field),
                        )
                    })?;
                if f.filter_type != EQUALITY_FILTER {
                    return Err(HubError::invalid_property_with(
                        format!("filters[{i}].type"),
                        format!("Unsupported filter type '{}'.", f.filter_type),
                    ));
                }
                let condition = match &f.value {
                    FilterValue::One(v) => Condition::Eq(Value::from(v.as_str())),
                    FilterValue::Many(vs) => {
                        Condition::In(vs.iter().map(|v| Value::from(v.as_str())).collect())
                    }
                };
                Ok(filter.with(path, condition))
            })?;

        let after = match request.skip_token.as_deref() {
            None | Some("") => None,
            Some(token) => Some(token.parse::<DocumentId>().map_err(|_| {
                HubError::invalid_property_with("skip_token", "Malformed skip token.")
            })?),
        };

        Ok(Self { filter, after })
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn after(&self) -> Option<DocumentId> {
        self.after
    }

    pub fn find_options(&self) -> FindOptions {
        FindOptions::default()
            .after(self.after)
            .limit(MAX_RESULTS_PER_PAGE)
    }
}

/// Continuation token for a page: set only when the page is full.
fn next_skip_token(page: &[StoredDocument]) -> Option<String> {
    if page.len() == MAX_RESULTS_PER_PAGE {
        page.last().map(|doc| doc.id.to_string())
    } else {
        None
    }
}

/// Query commits, returning them as host commits.
pub async fn query_commits<S: DocumentStore>(
    collections: &HubCollections<S>,
    deserializer: &dyn CommitDeserializer,
    request: &QueryRequest,
) -> HubResult<QueryResponse<Commit>> {
    let spec = QuerySpec::build(RecordKind::Commit, COMMIT_FILTER_FIELDS, request)?;
    debug!(filter = %spec.filter(), after = ?spec.after(), "querying commits");

    let commits = collections
        .commit_collection()
        .map_err(|e| storage_failure("resolve commit collection", e))?;
    let page = commits
        .find(spec.filter(), &spec.find_options())
        .await
        .map_err(|e| storage_failure("query commits", e))?;

    let results = page
        .iter()
        .map(|doc| {
            let stored = doc.body.get("commit").unwrap_or(&Value::Null);
            deserializer.deserialize(stored).map_err(|e| {
                error!(document_id = %doc.id, error = %e, "stored commit is unreadable");
                HubError::server("Error reading stored commit data.")
            })
        })
        .collect::<HubResult<Vec<Commit>>>()?;

    let skip_token = next_skip_token(&page);
    debug!(count = results.len(), skip_token = ?skip_token, "found matching commits");
    Ok(QueryResponse {
        results,
        pagination: Pagination { skip_token },
    })
}

/// Query the object cache, returning each object's metadata.
pub async fn query_objects<S: DocumentStore>(
    collections: &HubCollections<S>,
    request: &QueryRequest,
) -> HubResult<QueryResponse<ObjectMetadata>> {
    let spec = QuerySpec::build(RecordKind::Object, OBJECT_FILTER_FIELDS, request)?;
    debug!(filter = %spec.filter(), after = ?spec.after(), "querying objects");

    let objects = collections
        .object_collection()
        .map_err(|e| storage_failure("resolve object collection", e))?;
    let page = objects
        .find(spec.filter(), &spec.find_options())
        .await
        .map_err(|e| storage_failure("query objects", e))?;

    let results = page
        .iter()
        .map(|doc| {
            let fields = doc.body.get("fields").cloned().unwrap_or(Value::Null);
            serde_json::from_value::<ObjectMetadata>(fields).map_err(|e| {
                error!(document_id = %doc.id, error = %e, "stored object metadata is malformed");
                HubError::server("Error reading stored object data.")
            })
        })
        .collect::<HubResult<Vec<ObjectMetadata>>>()?;

    let skip_token = next_skip_token(&page);
    debug!(count = results.len(), skip_token = ?skip_token, "found matching objects");
    Ok(QueryResponse {
        results,
        pagination: Pagination { skip_token },
    })
}
