use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Connection settings for the backing document database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Endpoint of the database.
    pub url: String,
    /// Database holding both collections.
    pub database_id: String,
    /// Collection holding commit documents.
    pub commit_collection_id: String,
    /// Collection holding object cache documents.
    pub object_collection_id: String,
    /// Extra driver options, passed to the backend untouched.
    pub client_options: Map<String, Value>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".into(),
            database_id: "identity-hub".into(),
            commit_collection_id: "commits".into(),
            object_collection_id: "objects".into(),
            client_options: Map::new(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> StoreResult<()> {
        let required = [
            ("url", &self.url),
            ("database_id", &self.database_id),
            ("commit_collection_id", &self.commit_collection_id),
            ("object_collection_id", &self.object_collection_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::Config(format!("{name} must not be empty")));
            }
        }
        // Each collection carries its own unique index.
        if self.commit_collection_id == self.object_collection_id {
            return Err(StoreError::Config(format!(
                "commit_collection_id and object_collection_id must differ (both are {:?})",
                self.commit_collection_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.commit_collection_id, "commits");
        assert_eq!(c.object_collection_id, "objects");
        assert!(c.client_options.is_empty());
        c.validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let c = StoreConfig::from_toml_str(
            r#"
            url = "mongodb://db.internal:27017"
            database_id = "hub-prod"

            [client_options]
            maxPoolSize = 20
            tls = true
            "#,
        )
        .unwrap();
        assert_eq!(c.url, "mongodb://db.internal:27017");
        assert_eq!(c.database_id, "hub-prod");
        assert_eq!(c.commit_collection_id, "commits");
        assert_eq!(c.client_options["maxPoolSize"], Value::from(20));
        assert_eq!(c.client_options["tls"], Value::from(true));
    }

    #[test]
    fn rejects_empty_collection_name() {
        let err = StoreConfig::from_toml_str(r#"object_collection_id = """#).unwrap_err();
        assert_eq!(
            err,
            StoreError::Config("object_collection_id must not be empty".into())
        );
    }

    #[test]
    fn rejects_shared_collection() {
        let err = StoreConfig::from_toml_str(
            r#"
            commit_collection_id = "hub"
            object_collection_id = "hub"
            "#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            StoreError::Config(
                "commit_collection_id and object_collection_id must differ (both are \"hub\")"
                    .into()
            )
        );
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            StoreConfig::from_toml_str("url = "),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            StoreConfig::from_file("/nonexistent/hub-store.toml"),
            Err(StoreError::Config(_))
        ));
    }
}
