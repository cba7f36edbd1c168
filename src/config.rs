//! Configuration model for indexes, types and the engine connection.
//!
//! The crate does not parse configuration files; callers construct this
//! model and hand it to [`Connection::connect`](crate::Connection::connect).

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{EsError, Result};

const DEFAULT_SHARDS: u32 = 5;
const DEFAULT_WRITE_LIMIT: usize = 10_000;

/// Top-level configuration consumed by the query layer.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Index used when a builder does not pick one.
    pub default_index: String,
    /// Type used when a builder does not pick one.
    pub default_type: String,
    /// Log assembled request bodies at debug level.
    pub debug: bool,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Request timeout for the engine transport.
    pub request_timeout: Duration,
    /// Per-index configuration.
    pub indexes: HashMap<String, IndexConfig>,
    /// Named template bodies for template administration.
    pub templates: HashMap<String, Value>,
}

impl SearchConfig {
    /// Create a configuration with the given defaults.
    pub fn new(default_index: impl Into<String>, default_type: impl Into<String>) -> Self {
        Self {
            default_index: default_index.into(),
            default_type: default_type.into(),
            debug: false,
            username: None,
            password: None,
            request_timeout: Duration::from_secs(30),
            indexes: HashMap::new(),
            templates: HashMap::new(),
        }
    }

    /// Register an index configuration.
    pub fn with_index(mut self, name: impl Into<String>, index: IndexConfig) -> Self {
        self.indexes.insert(name.into(), index);
        self
    }

    /// Register a template body.
    pub fn with_template(mut self, name: impl Into<String>, body: Value) -> Self {
        self.templates.insert(name.into(), body);
        self
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable request-body debug logging.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Look up an index configuration.
    pub fn index(&self, name: &str) -> Result<&IndexConfig> {
        self.indexes
            .get(name)
            .ok_or_else(|| EsError::Configuration(format!("no configuration for index `{name}`")))
    }

    /// Look up a type configuration under an index.
    pub fn type_config(&self, index: &str, doc_type: &str) -> Result<&TypeConfig> {
        self.index(index)?.types.get(doc_type).ok_or_else(|| {
            EsError::Configuration(format!(
                "no configuration for type `{doc_type}` under index `{index}`"
            ))
        })
    }

    /// Alias configured for an index, if any.
    pub fn alias(&self, index: &str) -> Option<&str> {
        self.indexes.get(index).and_then(|i| i.alias.as_deref())
    }

    /// Shard count for an index, falling back to the engine default.
    pub fn shards(&self, index: &str) -> u32 {
        self.indexes
            .get(index)
            .map(|i| i.number_of_shards)
            .unwrap_or(DEFAULT_SHARDS)
    }

    /// Write-throughput limit for a type, falling back to the default.
    pub fn write_limit(&self, index: &str, doc_type: &str) -> usize {
        self.type_config(index, doc_type)
            .map(|t| t.limit)
            .unwrap_or(DEFAULT_WRITE_LIMIT)
    }
}

/// Configuration of one index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Engine endpoints for this index.
    pub hosts: Vec<String>,
    /// Optional alias; writes and searches prefer it over the index name.
    pub alias: Option<String>,
    /// Shard count, used for scroll batch sizing.
    pub number_of_shards: u32,
    /// Index settings sent on index creation.
    pub settings: Value,
    /// Per-type configuration.
    pub types: HashMap<String, TypeConfig>,
}

impl IndexConfig {
    /// Create an index configuration with the given endpoints.
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            alias: None,
            number_of_shards: DEFAULT_SHARDS,
            settings: Value::Object(Map::new()),
            types: HashMap::new(),
        }
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the shard count.
    pub fn with_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = shards;
        self
    }

    /// Set index settings.
    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    /// Register a type configuration.
    pub fn with_type(mut self, name: impl Into<String>, doc_type: TypeConfig) -> Self {
        self.types.insert(name.into(), doc_type);
        self
    }
}

/// Configuration of one document type.
#[derive(Debug, Clone)]
pub struct TypeConfig {
    /// Field whitelist applied to every write path.
    pub fields: Vec<String>,
    /// Write-throughput limit for bulk operations.
    pub limit: usize,
    /// Mapping body sent on mapping administration.
    pub mappings: Value,
    /// Optional model association label.
    pub model: Option<String>,
}

impl TypeConfig {
    /// Create a type configuration with defaults.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            limit: DEFAULT_WRITE_LIMIT,
            mappings: Value::Object(Map::new()),
            model: None,
        }
    }

    /// Set the field whitelist.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the write-throughput limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the mapping body.
    pub fn with_mappings(mut self, mappings: Value) -> Self {
        self.mappings = mappings;
        self
    }

    /// Set the model association label.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl Default for TypeConfig {
    fn default() -> Self {
        Self::new()
    }
}
