//! Structural and cross-field validation of stored records.
//!
//! Records are checked in their serialized form against a fixed schema, so
//! the failing property can be reported as a dotted path (`commit.fields.kid`,
//! `object.owner`, ...). Cross-field invariants run only after the schema
//! passes. Validation has no side effects and runs before any write.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use hub_types::{HubError, HubResult, Interface, Operation, StoredCommit, StoredObject};

const INTERFACE_NAMES: [&str; Interface::ALL.len()] = interface_names();
const OPERATION_NAMES: [&str; Operation::ALL.len()] = operation_names();
const INTERFACES: &[&str] = &INTERFACE_NAMES;
const OPERATIONS: &[&str] = &OPERATION_NAMES;

const fn interface_names() -> [&'static str; Interface::ALL.len()] {
    let mut names = [""; Interface::ALL.len()];
    let mut i = 0;
    while i < names.len() {
        names[i] = Interface::ALL[i].as_str();
        i += 1;
    }
    names
}

const fn operation_names() -> [&'static str; Operation::ALL.len()] {
    let mut names = [""; Operation::ALL.len()];
    let mut i = 0;
    while i < names.len() {
        names[i] = Operation::ALL[i].as_str();
        i += 1;
    }
    names
}

static LOWERCASE_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]+$").expect("invalid lowercase hex pattern"));
static BASE64_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid base64url pattern"));
static DID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^did:[a-z0-9]+(:[a-zA-Z0-9.-]+)+$").expect("invalid DID pattern")
});
static DID_WITH_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^did:[a-z0-9]+(:[a-zA-Z0-9.-]+)+#.+$").expect("invalid DID URL pattern")
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9]{4})-(1[0-2]|0[1-9])-(3[01]|0[1-9]|[12][0-9])T(2[0-3]|[01][0-9]):([0-5][0-9]):([0-5][0-9])(\.[0-9]+)?(Z)?$",
    )
    .expect("invalid ISO-8601 pattern")
});

/// String formats enforced by the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    LowercaseHex,
    Base64Url,
    Did,
    DidWithFragment,
    IsoDate,
}

impl Format {
    fn regex(&self) -> &'static Regex {
        match self {
            Self::LowercaseHex => &LOWERCASE_HEX,
            Self::Base64Url => &BASE64_URL,
            Self::Did => &DID,
            Self::DidWithFragment => &DID_WITH_FRAGMENT,
            Self::IsoDate => &ISO_DATE,
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex().is_match(value)
    }
}

#[derive(Clone, Copy, Debug)]
enum Rule {
    /// Non-empty string.
    Text,
    /// Any string, including empty.
    AnyText,
    /// String from a fixed set.
    OneOf(&'static [&'static str]),
    /// Non-empty string in a format.
    Matches(Format),
    /// Any JSON object.
    AnyObject,
    /// Object with exactly these fields.
    Object(&'static [Field]),
}

#[derive(Clone, Copy, Debug)]
struct Field {
    name: &'static str,
    rule: Rule,
    required: bool,
}

const fn required(name: &'static str, rule: Rule) -> Field {
    Field {
        name,
        rule,
        required: true,
    }
}

const fn optional(name: &'static str, rule: Rule) -> Field {
    Field {
        name,
        rule,
        required: false,
    }
}

const COMMIT_FIELDS: &[Field] = &[
    required("interface", Rule::OneOf(INTERFACES)),
    required("context", Rule::Text),
    required("type", Rule::Text),
    required("operation", Rule::OneOf(OPERATIONS)),
    required("committed_at", Rule::Matches(Format::IsoDate)),
    required("commit_strategy", Rule::Text),
    required("iss", Rule::Matches(Format::Did)),
    required("sub", Rule::Matches(Format::Did)),
    required("kid", Rule::Matches(Format::DidWithFragment)),
];

const COMMIT_ENVELOPE: &[Field] = &[
    required("protected", Rule::Matches(Format::Base64Url)),
    optional("header", Rule::AnyObject),
    optional("payload", Rule::AnyText),
    required("signature", Rule::Matches(Format::Base64Url)),
];

const STORED_COMMIT: &[Field] = &[
    required("kind", Rule::OneOf(&["commit"])),
    required("rev", Rule::Matches(Format::LowercaseHex)),
    required("object_id", Rule::Matches(Format::LowercaseHex)),
    required("owner", Rule::Matches(Format::Did)),
    required("fields", Rule::Object(COMMIT_FIELDS)),
    required("commit", Rule::Object(COMMIT_ENVELOPE)),
];

const OBJECT_FIELDS: &[Field] = &[
    required("interface", Rule::OneOf(INTERFACES)),
    required("context", Rule::Text),
    required("type", Rule::Text),
    required("id", Rule::Matches(Format::LowercaseHex)),
    required("created_at", Rule::Matches(Format::IsoDate)),
    required("created_by", Rule::Matches(Format::Did)),
    required("commit_strategy", Rule::Text),
    required("sub", Rule::Matches(Format::Did)),
];

const STORED_OBJECT: &[Field] = &[
    required("kind", Rule::OneOf(&["object"])),
    required("object_id", Rule::Matches(Format::LowercaseHex)),
    required("owner", Rule::Matches(Format::Did)),
    required("fields", Rule::Object(OBJECT_FIELDS)),
];

/// Validate a commit document before it is written.
pub fn validate_commit(commit: &StoredCommit) -> HubResult<()> {
    check_schema("commit", commit, STORED_COMMIT)?;

    if commit.owner != commit.fields.sub {
        return Err(HubError::bad_request(
            "The 'owner' and 'fields.sub' fields must match.",
        ));
    }
    if commit.fields.operation == "create" && commit.object_id != commit.rev {
        return Err(HubError::bad_request(
            "The 'object_id' and 'rev' fields must match for a 'create' commit.",
        ));
    }
    Ok(())
}

/// Validate an object cache document before it is written.
pub fn validate_object(object: &StoredObject) -> HubResult<()> {
    check_schema("object", object, STORED_OBJECT)?;

    if object.owner != object.fields.sub {
        return Err(HubError::bad_request(
            "The object 'owner' and 'fields.sub' fields must match.",
        ));
    }
    if object.object_id != object.fields.id {
        return Err(HubError::bad_request(
            "The object 'object_id' and 'fields.id' fields must match.",
        ));
    }
    Ok(())
}

fn check_schema<T: Serialize>(root: &str, record: &T, schema: &'static [Field]) -> HubResult<()> {
    let value = serde_json::to_value(record).map_err(|e| {
        tracing::error!(record = root, error = %e, "could not serialize record for validation");
        HubError::server(format!("Error validating {root} data."))
    })?;
    check_value(&value, Rule::Object(schema), root).map_err(HubError::invalid_property)
}

/// Returns the path of the first violation.
fn check_value(value: &Value, rule: Rule, path: &str) -> Result<(), String> {
    let ok = match rule {
        Rule::Text => value.as_str().is_some_and(|s| !s.is_empty()),
        Rule::AnyText => value.is_string(),
        Rule::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
        Rule::Matches(format) => value.as_str().is_some_and(|s| format.is_match(s)),
        Rule::AnyObject => value.is_object(),
        Rule::Object(fields) => {
            let map = value.as_object().ok_or_else(|| path.to_string())?;
            return check_fields(map, fields, path);
        }
    };
    if ok {
        Ok(())
    } else {
        Err(path.to_string())
    }
}

fn check_fields(map: &Map<String, Value>, fields: &[Field], path: &str) -> Result<(), String> {
    for field in fields {
        let field_path = format!("{path}.{}", field.name);
        match map.get(field.name) {
            None | Some(Value::Null) if field.required => return Err(field_path),
            None | Some(Value::Null) => {}
            Some(value) => check_value(value, field.rule, &field_path)?,
        }
    }
    if let Some(unknown) = map
        .keys()
        .find(|key| !fields.iter().any(|f| f.name == key.as_str()))
    {
        return Err(format!("{path}.{unknown}"));
    }
    Ok(())
}
