use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A schemaless JSON document.
pub type Document = Map<String, Value>;

/// Storage-assigned document identifier.
///
/// Ids increase monotonically in insertion order, so they double as the
/// pagination key. The string form is 24 lowercase hex characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(u64);

impl DocumentId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:024x}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidDocumentId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| StoreError::InvalidDocumentId(s.to_string()))
    }
}

/// A document together with the id the store assigned to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub body: Document,
}

/// Match condition for a single document path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The value at the path equals this value.
    Eq(Value),
    /// The value at the path equals one of these values.
    In(Vec<Value>),
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Self::Eq(expected), Some(actual)) => expected == actual,
            (Self::In(options), Some(actual)) => options.contains(actual),
            (_, None) => false,
        }
    }
}

/// Conjunction of path conditions.
///
/// Each path appears at most once; setting a path again replaces its
/// previous condition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the condition for `path`.
    pub fn with(mut self, path: impl Into<String>, condition: Condition) -> Self {
        let path = path.into();
        match self.clauses.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = condition,
            None => self.clauses.push((path, condition)),
        }
        self
    }

    pub fn eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(path, Condition::Eq(value.into()))
    }

    pub fn any_of(self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.with(path, Condition::In(values))
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn condition(&self, path: &str) -> Option<&Condition> {
        self.clauses
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, c)| c)
    }

    /// Returns `true` if every clause matches `document`.
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(path, condition)| condition.matches(lookup(document, path)))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (path, condition)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match condition {
                Condition::Eq(v) => write!(f, "{path}: {v}")?,
                Condition::In(vs) => write!(f, "{path}: {{$in: {}}}", Value::from(vs.clone()))?,
            }
        }
        f.write_str("}")
    }
}

/// Options for `find`. Results are always sorted by ascending id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Only return documents whose id is strictly greater than this.
    pub after: Option<DocumentId>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Dotted paths to keep; `None` returns whole documents.
    pub projection: Option<Vec<String>>,
}

impl FindOptions {
    pub fn after(mut self, id: Option<DocumentId>) -> Self {
        self.after = id;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project(mut self, paths: &[&str]) -> Self {
        self.projection = Some(paths.iter().map(|p| p.to_string()).collect());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self { unique: true }
    }
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Copy only the listed dotted paths out of `document`.
pub fn project(document: &Document, paths: &[String]) -> Document {
    let mut out = Document::new();
    for path in paths {
        if let Some(value) = lookup(document, path) {
            let segments: Vec<&str> = path.split('.').collect();
            insert_path(&mut out, &segments, value.clone());
        }
    }
    out
}

fn insert_path(target: &mut Document, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = entry {
                insert_path(map, rest, value);
            }
        }
    }
}
