//! Bulk action model: action-metadata lines plus optional document lines.

use serde_json::{json, Map, Value};

/// Kind of a bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkAction {
    /// Index a document (create or replace).
    #[default]
    Index,
    /// Create a document, failing if it exists.
    Create,
    /// Partially update a document.
    Update,
    /// Delete a document.
    Delete,
}

impl BulkAction {
    /// Engine-side action name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse an action discriminator; unrecognized names default to `index`.
    pub fn parse(token: &str) -> Self {
        match token {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Index,
        }
    }
}

/// One item of a bulk request.
#[derive(Debug, Clone)]
pub struct BulkOperation {
    /// Action kind.
    pub action: BulkAction,
    /// Document identifier; optional for `index`/`create`.
    pub id: Option<String>,
    /// Document body; ignored for `delete`.
    pub doc: Value,
}

impl BulkOperation {
    /// Index a document with an engine-assigned identifier.
    pub fn index(doc: Value) -> Self {
        Self {
            action: BulkAction::Index,
            id: None,
            doc,
        }
    }

    /// Index a document under an explicit identifier.
    pub fn index_with_id(id: impl Into<String>, doc: Value) -> Self {
        Self {
            action: BulkAction::Index,
            id: Some(id.into()),
            doc,
        }
    }

    /// Create a document, failing if it exists.
    pub fn create(id: impl Into<String>, doc: Value) -> Self {
        Self {
            action: BulkAction::Create,
            id: Some(id.into()),
            doc,
        }
    }

    /// Partially update a document.
    pub fn update(id: impl Into<String>, doc: Value) -> Self {
        Self {
            action: BulkAction::Update,
            id: Some(id.into()),
            doc,
        }
    }

    /// Delete a document.
    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            action: BulkAction::Delete,
            id: None,
            doc: Value::Null,
        }
        .with_id(id)
    }

    /// Set the document identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Render the action-metadata line for the given target.
    pub fn action_line(&self, index: &str, doc_type: &str) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), json!(index));
        meta.insert("_type".to_string(), json!(doc_type));
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), json!(id));
        }
        json!({ self.action.as_str(): meta })
    }

    /// Render the document line from an already-whitelisted body.
    /// `delete` has no document line; `update` wraps it under `doc`.
    pub fn doc_line(&self, filtered: Map<String, Value>) -> Option<Value> {
        match self.action {
            BulkAction::Delete => None,
            BulkAction::Update => Some(json!({ "doc": filtered })),
            BulkAction::Index | BulkAction::Create => Some(Value::Object(filtered)),
        }
    }
}
