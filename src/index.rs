//! Index administration: creation, mappings, aliases, templates and stats.

use serde_json::{json, Value};

use crate::client::Connection;
use crate::error::{EsError, Result};

/// Administrative operations against one index and type.
///
/// Bodies for creation, mappings and templates come from the connection's
/// configuration, so administration and the write path stay in agreement.
#[derive(Debug, Clone)]
pub struct IndexManager {
    connection: Connection,
    index: Option<String>,
    doc_type: Option<String>,
}

impl IndexManager {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            index: None,
            doc_type: None,
        }
    }

    /// Pick the index, overriding the configured default.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Pick the type, overriding the configured default.
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    fn index_name(&self) -> &str {
        self.index
            .as_deref()
            .unwrap_or(&self.connection.config().default_index)
    }

    fn type_name(&self) -> &str {
        self.doc_type
            .as_deref()
            .unwrap_or(&self.connection.config().default_type)
    }

    /// Create the index with its configured settings and the mapping of
    /// every configured type.
    pub async fn create(&self) -> Result<Value> {
        let config = self.connection.config();
        let index = config.index(self.index_name())?;
        let mut mappings = serde_json::Map::new();
        for (name, doc_type) in &index.types {
            mappings.insert(name.clone(), doc_type.mappings.clone());
        }
        let body = json!({
            "settings": index.settings,
            "mappings": mappings
        });
        self.connection
            .engine()
            .create_index(self.index_name(), body)
            .await
    }

    /// Drop the index and everything in it.
    pub async fn truncate(&self) -> Result<Value> {
        self.connection.engine().delete_index(self.index_name()).await
    }

    /// Push the configured mapping for the resolved type.
    pub async fn update_mapping(&self) -> Result<Value> {
        let mappings = self
            .connection
            .config()
            .type_config(self.index_name(), self.type_name())?
            .mappings
            .clone();
        self.connection
            .engine()
            .put_mapping(self.index_name(), self.type_name(), mappings)
            .await
    }

    /// Remove the resolved type's mapping.
    pub async fn delete_mapping(&self) -> Result<Value> {
        self.connection
            .engine()
            .delete_mapping(self.index_name(), self.type_name())
            .await
    }

    /// Point an alias at the index; defaults to the configured alias.
    pub async fn create_alias(&self, name: Option<&str>) -> Result<Value> {
        let alias = self.resolve_alias(name)?;
        self.connection
            .engine()
            .put_alias(self.index_name(), &alias)
            .await
    }

    /// Whether an alias points at the index.
    pub async fn alias_exists(&self, name: Option<&str>) -> Result<bool> {
        let alias = self.resolve_alias(name)?;
        self.connection
            .engine()
            .alias_exists(self.index_name(), &alias)
            .await
    }

    /// Remove an alias from the index.
    pub async fn delete_alias(&self, name: Option<&str>) -> Result<Value> {
        let alias = self.resolve_alias(name)?;
        self.connection
            .engine()
            .delete_alias(self.index_name(), &alias)
            .await
    }

    /// Atomically repoint an alias from this index to another.
    pub async fn migrate(&self, alias: &str, new_index: &str) -> Result<Value> {
        let body = json!({
            "actions": [
                { "remove": { "index": self.index_name(), "alias": alias } },
                { "add": { "index": new_index, "alias": alias } }
            ]
        });
        self.connection.engine().update_aliases(body).await
    }

    /// Install a configured template body under its name.
    pub async fn create_template(&self, name: &str) -> Result<Value> {
        let body = self
            .connection
            .config()
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| {
                EsError::Configuration(format!("no template body configured for `{name}`"))
            })?;
        self.connection.engine().put_template(name, body).await
    }

    /// Remove an installed template.
    pub async fn delete_template(&self, name: &str) -> Result<Value> {
        self.connection.engine().delete_template(name).await
    }

    /// Statistics for the index, unwrapped from the engine's per-index map.
    pub async fn stats(&self) -> Result<Value> {
        let raw = self.connection.engine().stats(self.index_name()).await?;
        Ok(raw
            .pointer(&format!("/indices/{}", self.index_name()))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn resolve_alias(&self, name: Option<&str>) -> Result<String> {
        name.map(|n| n.to_string())
            .or_else(|| {
                self.connection
                    .config()
                    .alias(self.index_name())
                    .map(|a| a.to_string())
            })
            .ok_or_else(|| {
                EsError::Configuration(format!(
                    "no alias given or configured for index `{}`",
                    self.index_name()
                ))
            })
    }
}
