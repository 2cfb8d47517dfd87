use serde::{Deserialize, Serialize};

use crate::commit::Commit;

/// Filter value: a single scalar or a set of accepted scalars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// One caller-supplied query filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: String,
    #[serde(rename = "type")]
    pub filter_type: String,
    pub value: FilterValue,
}

impl QueryFilter {
    /// Equality filter on `field`.
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            filter_type: "eq".into(),
            value: value.into(),
        }
    }
}

/// Query over commits or objects belonging to one owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub owner: String,
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_token: Option<String>,
}

impl QueryRequest {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            filters: Vec::new(),
            skip_token: None,
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_skip_token(mut self, token: Option<String>) -> Self {
        self.skip_token = token;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Present only when the page was full and more results may follow.
    pub skip_token: Option<String>,
}

/// One page of query results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryResponse<T> {
    pub results: Vec<T>,
    pub pagination: Pagination,
}

impl<T> QueryResponse<T> {
    pub fn skip_token(&self) -> Option<&str> {
        self.pagination.skip_token.as_deref()
    }
}

/// Request to record a commit for `owner`'s hub.
#[derive(Clone, Debug)]
pub struct CommitRequest {
    pub owner: String,
    pub commit: Commit,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    pub known_revisions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_scalar_and_set_filters() {
        let request: QueryRequest = serde_json::from_value(json!({
            "owner": "did:example:alice",
            "filters": [
                { "field": "interface", "type": "eq", "value": "Collections" },
                { "field": "object_id", "type": "eq", "value": ["a1", "b2"] },
            ],
        }))
        .unwrap();

        assert_eq!(request.skip_token, None);
        assert_eq!(request.filters[0], QueryFilter::eq("interface", "Collections"));
        assert_eq!(
            request.filters[1].value,
            FilterValue::Many(vec!["a1".into(), "b2".into()])
        );
    }

    #[test]
    fn filters_default_to_empty() {
        let request: QueryRequest =
            serde_json::from_value(json!({ "owner": "did:example:bob" })).unwrap();
        assert!(request.filters.is_empty());
    }
}
