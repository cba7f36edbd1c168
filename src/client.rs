//! Engine client seam and its HTTP implementation.
//!
//! The query layer talks to the engine through the [`EngineClient`] trait,
//! so tests can inject a fake. [`HttpEngine`] is the one real
//! implementation, driving every call through the raw transport of the
//! `opensearch` crate so that legacy `{index}/{type}` paths, scroll
//! endpoints and administrative calls all share a single code path.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use opensearch::http::headers::{HeaderMap, HeaderValue, CONTENT_TYPE};
use opensearch::http::request::{JsonBody, NdBody};
use opensearch::http::transport::{SingleNodeConnectionPool, Transport, TransportBuilder};
use opensearch::http::{Method, Url};
use serde_json::{json, Value};

use crate::config::SearchConfig;
use crate::error::{EsError, Result};
use crate::index::IndexManager;
use crate::query::Query;

/// Per-request search options carried outside the body.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Alternate search type (e.g. `scan`).
    pub search_type: Option<String>,
    /// Scroll cursor lifetime; presence opens a scroll.
    pub scroll: Option<String>,
    /// Ask the engine to explain scoring.
    pub explain: bool,
}

/// Capability the query layer consumes: fully-formed request bodies in,
/// raw JSON responses out. One attempt per call, fail-fast.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Execute a search.
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        body: Value,
        options: &SearchOptions,
    ) -> Result<Value>;

    /// Count matching documents.
    async fn count(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;

    /// Fetch a document by identifier.
    async fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<Value>;

    /// Create a document, failing if it exists.
    async fn create_doc(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value>;

    /// Index a document, replacing any existing one.
    async fn index_doc(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value>;

    /// Update a document by identifier.
    async fn update_doc(&self, index: &str, doc_type: &str, id: &str, body: Value)
        -> Result<Value>;

    /// Update every document matching a query.
    async fn update_by_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;

    /// Delete every document matching a query.
    async fn delete_by_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;

    /// Delete a document by identifier.
    async fn delete_doc(&self, index: &str, doc_type: &str, id: &str) -> Result<Value>;

    /// Execute interleaved action-metadata and document lines.
    async fn bulk(&self, lines: Vec<Value>) -> Result<Value>;

    /// Fetch several documents in one round trip.
    async fn mget(&self, body: Value) -> Result<Value>;

    /// Continue a scrolled search.
    async fn scroll(&self, scroll_id: &str, expire: &str) -> Result<Value>;

    /// Release a scroll cursor.
    async fn clear_scroll(&self, scroll_id: &str) -> Result<Value>;

    /// Create an index with settings and mappings.
    async fn create_index(&self, index: &str, body: Value) -> Result<Value>;

    /// Delete an index.
    async fn delete_index(&self, index: &str) -> Result<Value>;

    /// Put a type mapping.
    async fn put_mapping(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;

    /// Delete a type mapping.
    async fn delete_mapping(&self, index: &str, doc_type: &str) -> Result<Value>;

    /// Point an alias at an index.
    async fn put_alias(&self, index: &str, name: &str) -> Result<Value>;

    /// Check whether an alias points at an index.
    async fn alias_exists(&self, index: &str, name: &str) -> Result<bool>;

    /// Remove an alias from an index.
    async fn delete_alias(&self, index: &str, name: &str) -> Result<Value>;

    /// Atomically add and remove alias associations.
    async fn update_aliases(&self, body: Value) -> Result<Value>;

    /// Store an index template.
    async fn put_template(&self, name: &str, body: Value) -> Result<Value>;

    /// Delete an index template.
    async fn delete_template(&self, name: &str) -> Result<Value>;

    /// Index statistics.
    async fn stats(&self, index: &str) -> Result<Value>;

    /// Validate a query body without executing it.
    async fn validate_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value>;
}

/// HTTP implementation of [`EngineClient`] over the `opensearch` transport.
pub struct HttpEngine {
    transport: Transport,
}

impl HttpEngine {
    /// Build a transport from the configuration of the default index.
    pub fn connect(config: &SearchConfig) -> Result<Self> {
        let index = config.index(&config.default_index)?;
        let host = index.hosts.first().ok_or_else(|| {
            EsError::Configuration(format!(
                "no hosts configured for index `{}`",
                config.default_index
            ))
        })?;

        info!("connecting to search engine at {host}");

        let url = Url::parse(host)
            .map_err(|e| EsError::Connection(format!("invalid host url `{host}`: {e}")))?;
        let pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(pool)
            .timeout(config.request_timeout)
            .disable_proxy();
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }
        let transport = builder
            .build()
            .map_err(|e| EsError::Connection(e.to_string()))?;

        Ok(Self { transport })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value> {
        debug!("{method:?} {path}");
        let query_ref = if query.is_empty() { None } else { Some(&query) };
        let response = self
            .transport
            .send(
                method,
                path,
                HeaderMap::new(),
                query_ref,
                body.map(JsonBody::new),
                None,
            )
            .await?;
        let status = response.status_code().as_u16();
        let value: Value = response.json().await?;
        check_status(status, value)
    }
}

fn check_status(status: u16, value: Value) -> Result<Value> {
    match status {
        404 => Err(EsError::NotFound {
            status,
            reason: error_reason(&value),
        }),
        s if (400..500).contains(&s) => Err(EsError::Client {
            status,
            reason: error_reason(&value),
        }),
        s if s >= 500 => Err(EsError::Engine {
            status,
            reason: error_reason(&value),
        }),
        _ => Ok(value),
    }
}

fn error_reason(value: &Value) -> String {
    value
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .or_else(|| {
            value
                .get("error")
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| value.to_string())
}

#[async_trait]
impl EngineClient for HttpEngine {
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        body: Value,
        options: &SearchOptions,
    ) -> Result<Value> {
        let mut query = Vec::new();
        if let Some(search_type) = &options.search_type {
            query.push(("search_type".to_string(), search_type.clone()));
        }
        if let Some(scroll) = &options.scroll {
            query.push(("scroll".to_string(), scroll.clone()));
        }
        if options.explain {
            query.push(("explain".to_string(), "true".to_string()));
        }
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/_search"),
            query,
            Some(body),
        )
        .await
    }

    async fn count(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/_count"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn get(&self, index: &str, doc_type: &str, id: &str) -> Result<Value> {
        self.send(
            Method::Get,
            &format!("/{index}/{doc_type}/{id}"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn create_doc(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value> {
        match id {
            Some(id) => {
                self.send(
                    Method::Put,
                    &format!("/{index}/{doc_type}/{id}/_create"),
                    Vec::new(),
                    Some(body),
                )
                .await
            }
            None => {
                self.send(
                    Method::Post,
                    &format!("/{index}/{doc_type}"),
                    Vec::new(),
                    Some(body),
                )
                .await
            }
        }
    }

    async fn index_doc(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value> {
        match id {
            Some(id) => {
                self.send(
                    Method::Put,
                    &format!("/{index}/{doc_type}/{id}"),
                    Vec::new(),
                    Some(body),
                )
                .await
            }
            None => {
                self.send(
                    Method::Post,
                    &format!("/{index}/{doc_type}"),
                    Vec::new(),
                    Some(body),
                )
                .await
            }
        }
    }

    async fn update_doc(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: Value,
    ) -> Result<Value> {
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/{id}/_update"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn update_by_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/_update_by_query"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn delete_by_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/_delete_by_query"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn delete_doc(&self, index: &str, doc_type: &str, id: &str) -> Result<Value> {
        self.send(
            Method::Delete,
            &format!("/{index}/{doc_type}/{id}"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn bulk(&self, lines: Vec<Value>) -> Result<Value> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-ndjson"),
        );
        let body = NdBody::new(lines.into_iter().map(JsonBody::new).collect());
        let response = self
            .transport
            .send(
                Method::Post,
                "/_bulk",
                headers,
                None::<&Vec<(String, String)>>,
                Some(body),
                None,
            )
            .await?;
        let status = response.status_code().as_u16();
        let value: Value = response.json().await?;
        check_status(status, value)
    }

    async fn mget(&self, body: Value) -> Result<Value> {
        self.send(Method::Post, "/_mget", Vec::new(), Some(body))
            .await
    }

    async fn scroll(&self, scroll_id: &str, expire: &str) -> Result<Value> {
        self.send(
            Method::Post,
            "/_search/scroll",
            Vec::new(),
            Some(json!({ "scroll": expire, "scroll_id": scroll_id })),
        )
        .await
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<Value> {
        self.send(
            Method::Delete,
            "/_search/scroll",
            Vec::new(),
            Some(json!({ "scroll_id": [scroll_id] })),
        )
        .await
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<Value> {
        self.send(Method::Put, &format!("/{index}"), Vec::new(), Some(body))
            .await
    }

    async fn delete_index(&self, index: &str) -> Result<Value> {
        self.send(Method::Delete, &format!("/{index}"), Vec::new(), None)
            .await
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Put,
            &format!("/{index}/_mapping/{doc_type}"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn delete_mapping(&self, index: &str, doc_type: &str) -> Result<Value> {
        self.send(
            Method::Delete,
            &format!("/{index}/{doc_type}/_mapping"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn put_alias(&self, index: &str, name: &str) -> Result<Value> {
        self.send(
            Method::Put,
            &format!("/{index}/_alias/{name}"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn alias_exists(&self, index: &str, name: &str) -> Result<bool> {
        let response = self
            .transport
            .send(
                Method::Head,
                &format!("/{index}/_alias/{name}"),
                HeaderMap::new(),
                None::<&Vec<(String, String)>>,
                None::<JsonBody<Value>>,
                None,
            )
            .await?;
        let status = response.status_code().as_u16();
        match status {
            404 => Ok(false),
            s if s < 300 => Ok(true),
            s => Err(EsError::Client {
                status: s,
                reason: "alias existence check failed".to_string(),
            }),
        }
    }

    async fn delete_alias(&self, index: &str, name: &str) -> Result<Value> {
        self.send(
            Method::Delete,
            &format!("/{index}/_alias/{name}"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn update_aliases(&self, body: Value) -> Result<Value> {
        self.send(Method::Post, "/_aliases", Vec::new(), Some(body))
            .await
    }

    async fn put_template(&self, name: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Put,
            &format!("/_template/{name}"),
            Vec::new(),
            Some(body),
        )
        .await
    }

    async fn delete_template(&self, name: &str) -> Result<Value> {
        self.send(
            Method::Delete,
            &format!("/_template/{name}"),
            Vec::new(),
            None,
        )
        .await
    }

    async fn stats(&self, index: &str) -> Result<Value> {
        self.send(Method::Get, &format!("/{index}/_stats"), Vec::new(), None)
            .await
    }

    async fn validate_query(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.send(
            Method::Post,
            &format!("/{index}/{doc_type}/_validate/query"),
            Vec::new(),
            Some(body),
        )
        .await
    }
}

/// Shared application context: one engine handle plus configuration,
/// created once and cloned cheaply into every builder instance.
///
/// Each logical query gets its own [`Query`] builder; the connection itself
/// is stateless per call and safe to share across tasks.
#[derive(Clone)]
pub struct Connection {
    engine: Arc<dyn EngineClient>,
    config: Arc<SearchConfig>,
}

impl Connection {
    /// Connect to the engine described by the configuration.
    pub fn connect(config: SearchConfig) -> Result<Self> {
        let engine = HttpEngine::connect(&config)?;
        Ok(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        })
    }

    /// Build a connection around an injected engine, for tests or custom
    /// transports.
    pub fn with_engine(config: SearchConfig, engine: Arc<dyn EngineClient>) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The engine handle.
    pub fn engine(&self) -> &dyn EngineClient {
        self.engine.as_ref()
    }

    /// Start a fresh query builder.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Index administration for the default index and type.
    pub fn indices(&self) -> IndexManager {
        IndexManager::new(self.clone())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("default_index", &self.config.default_index)
            .field("default_type", &self.config.default_type)
            .finish()
    }
}
