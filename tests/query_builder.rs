//! End-to-end builder tests against an injected fake engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use esquery::{
    Boolean, BulkOperation, Connection, EngineClient, EsError, IndexConfig, Result, ScrollPhase,
    SearchConfig, SearchOptions, SortOrder, TypeConfig,
};

/// Records every call and replays canned responses.
#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, Value>>,
}

impl FakeEngine {
    fn with_response(self, op: &str, response: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(op.to_string(), response);
        self
    }

    fn record(&self, op: &str, detail: Value) -> Result<Value> {
        self.calls.lock().unwrap().push((op.to_string(), detail));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(op)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineClient for FakeEngine {
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        body: Value,
        options: &SearchOptions,
    ) -> Result<Value> {
        self.record(
            "search",
            json!({
                "index": index,
                "doc_type": doc_type,
                "body": body,
                "scroll": options.scroll,
                "search_type": options.search_type,
            }),
        )
    }

    async fn count(&self, index: &str, _doc_type: &str, body: Value) -> Result<Value> {
        self.record("count", json!({ "index": index, "body": body }))
    }

    async fn get(&self, index: &str, _doc_type: &str, id: &str) -> Result<Value> {
        if id == "missing" {
            return Err(EsError::NotFound {
                status: 404,
                reason: "no such document".to_string(),
            });
        }
        self.record("get", json!({ "index": index, "id": id }))
    }

    async fn create_doc(
        &self,
        index: &str,
        _doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value> {
        self.record(
            "create_doc",
            json!({ "index": index, "id": id, "body": body }),
        )
    }

    async fn index_doc(
        &self,
        index: &str,
        _doc_type: &str,
        id: Option<&str>,
        body: Value,
    ) -> Result<Value> {
        self.record(
            "index_doc",
            json!({ "index": index, "id": id, "body": body }),
        )
    }

    async fn update_doc(
        &self,
        index: &str,
        _doc_type: &str,
        id: &str,
        body: Value,
    ) -> Result<Value> {
        self.record(
            "update_doc",
            json!({ "index": index, "id": id, "body": body }),
        )
    }

    async fn update_by_query(&self, index: &str, _doc_type: &str, body: Value) -> Result<Value> {
        self.record("update_by_query", json!({ "index": index, "body": body }))
    }

    async fn delete_by_query(&self, index: &str, _doc_type: &str, body: Value) -> Result<Value> {
        self.record("delete_by_query", json!({ "index": index, "body": body }))
    }

    async fn delete_doc(&self, index: &str, _doc_type: &str, id: &str) -> Result<Value> {
        self.record("delete_doc", json!({ "index": index, "id": id }))
    }

    async fn bulk(&self, lines: Vec<Value>) -> Result<Value> {
        self.record("bulk", json!(lines))
    }

    async fn mget(&self, body: Value) -> Result<Value> {
        self.record("mget", body)
    }

    async fn scroll(&self, scroll_id: &str, expire: &str) -> Result<Value> {
        self.record(
            "scroll",
            json!({ "scroll_id": scroll_id, "expire": expire }),
        )
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<Value> {
        self.record("clear_scroll", json!({ "scroll_id": scroll_id }))
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<Value> {
        self.record("create_index", json!({ "index": index, "body": body }))
    }

    async fn delete_index(&self, index: &str) -> Result<Value> {
        self.record("delete_index", json!({ "index": index }))
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: Value) -> Result<Value> {
        self.record(
            "put_mapping",
            json!({ "index": index, "doc_type": doc_type, "body": body }),
        )
    }

    async fn delete_mapping(&self, index: &str, doc_type: &str) -> Result<Value> {
        self.record(
            "delete_mapping",
            json!({ "index": index, "doc_type": doc_type }),
        )
    }

    async fn put_alias(&self, index: &str, name: &str) -> Result<Value> {
        self.record("put_alias", json!({ "index": index, "name": name }))
    }

    async fn alias_exists(&self, index: &str, name: &str) -> Result<bool> {
        self.record("alias_exists", json!({ "index": index, "name": name }))?;
        Ok(true)
    }

    async fn delete_alias(&self, index: &str, name: &str) -> Result<Value> {
        self.record("delete_alias", json!({ "index": index, "name": name }))
    }

    async fn update_aliases(&self, body: Value) -> Result<Value> {
        self.record("update_aliases", body)
    }

    async fn put_template(&self, name: &str, body: Value) -> Result<Value> {
        self.record("put_template", json!({ "name": name, "body": body }))
    }

    async fn delete_template(&self, name: &str) -> Result<Value> {
        self.record("delete_template", json!({ "name": name }))
    }

    async fn stats(&self, index: &str) -> Result<Value> {
        self.record("stats", json!({ "index": index }))
    }

    async fn validate_query(&self, index: &str, _doc_type: &str, body: Value) -> Result<Value> {
        self.record("validate_query", json!({ "index": index, "body": body }))
    }
}

fn config() -> SearchConfig {
    SearchConfig::new("articles", "post").with_index(
        "articles",
        IndexConfig::new(vec!["http://localhost:9200".to_string()])
            .with_shards(5)
            .with_type(
                "post",
                TypeConfig::new().with_fields(vec![
                    "title".to_string(),
                    "status".to_string(),
                    "views".to_string(),
                ]),
            ),
    )
}

fn connect(engine: FakeEngine) -> (Connection, Arc<FakeEngine>) {
    let engine = Arc::new(engine);
    (
        Connection::with_engine(config(), engine.clone()),
        engine,
    )
}

fn hits(total: u64, docs: Vec<Value>) -> Value {
    json!({ "hits": { "total": total, "hits": docs } })
}

#[tokio::test]
async fn test_search_sends_assembled_body_and_normalizes_hits() {
    let (connection, engine) = connect(FakeEngine::default().with_response(
        "search",
        hits(
            2,
            vec![
                json!({ "_id": "1", "_source": { "title": "a" } }),
                json!({ "_id": "2", "_source": { "title": "b" } }),
            ],
        ),
    ));

    let mut query = connection
        .query()
        .where_clause("views", ">=", 100)
        .or_where("status", "=", "draft")
        .order_by("views", SortOrder::Desc)
        .paginate(0, 20);
    let result = query.search().await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.records[0]["_id"], "1");
    assert_eq!(result.records[1]["title"], "b");

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let (op, detail) = &calls[0];
    assert_eq!(op, "search");
    assert_eq!(detail["index"], "articles");
    let body = &detail["body"];
    assert_eq!(
        body.pointer("/query/bool/must/0/bool/must/0/range/views/from"),
        Some(&json!(100))
    );
    assert_eq!(
        body.pointer("/query/bool/must/0/bool/should/0/match/status/query"),
        Some(&json!("draft"))
    );
    assert_eq!(body["from"], 0);
    assert_eq!(body["size"], 20);
    assert_eq!(body["sort"][0]["views"]["order"], "desc");
}

#[tokio::test]
async fn test_empty_tree_update_and_delete_skip_the_engine() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query();
    let updated = query.update(json!({ "title": "x" })).await.unwrap();
    let deleted = query.delete().await.unwrap();

    assert_eq!(updated, json!({}));
    assert_eq!(deleted, json!({}));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_update_builds_parameterized_script_from_whitelisted_fields() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query().where_eq("status", "draft");
    query
        .update(json!({ "title": "new", "secret": "dropped" }))
        .await
        .unwrap();

    let calls = engine.calls();
    assert_eq!(calls[0].0, "update_by_query");
    let body = &calls[0].1["body"];
    assert_eq!(body["conflicts"], "proceed");
    assert_eq!(body["script"]["lang"], "painless");
    assert_eq!(
        body["script"]["inline"],
        "ctx._source.title = params.title"
    );
    assert_eq!(body["script"]["params"], json!({ "title": "new" }));
    assert!(body
        .pointer("/query/bool/must/0/bool/must/0/match/status")
        .is_some());
}

#[tokio::test]
async fn test_increase_uses_counter_parameter() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query().where_eq("status", "published");
    query.increase("views", 3).await.unwrap();

    let body = &engine.calls()[0].1["body"];
    assert_eq!(body["script"]["inline"], "ctx._source.views += params.count");
    assert_eq!(body["script"]["params"]["count"], 3);
}

#[tokio::test]
async fn test_scroll_batch_size_divides_requested_total_by_shards() {
    let (connection, engine) = connect(FakeEngine::default().with_response(
        "search",
        json!({
            "_scroll_id": "cursor-1",
            "hits": { "total": 1000, "hits": [{ "_id": "1", "_source": {} }] }
        }),
    ));

    let mut query = connection.query().scroll(1000, "1m", None);
    let result = query.search().await.unwrap();

    assert_eq!(result.scroll_id.as_deref(), Some("cursor-1"));
    assert_eq!(query.scroll_state().phase(), ScrollPhase::Scrolling);

    let (_, detail) = &engine.calls()[0];
    assert_eq!(detail["body"]["size"], 200);
    assert_eq!(detail["scroll"], "1m");
}

#[tokio::test]
async fn test_scroll_continuation_without_cursor_is_a_noop() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query();
    let result = query.search_by_scroll_id(None).await.unwrap();

    assert!(result.is_empty());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_scroll_continuation_uses_last_cursor() {
    let (connection, engine) = connect(
        FakeEngine::default()
            .with_response(
                "search",
                json!({
                    "_scroll_id": "cursor-1",
                    "hits": { "total": 10, "hits": [{ "_id": "1", "_source": {} }] }
                }),
            )
            .with_response(
                "scroll",
                json!({
                    "_scroll_id": "cursor-2",
                    "hits": { "total": 10, "hits": [] }
                }),
            ),
    );

    let mut query = connection.query().scroll(100, "30s", None);
    query.search().await.unwrap();
    let batch = query.search_by_scroll_id(None).await.unwrap();

    assert!(batch.is_empty());
    assert_eq!(query.scroll_state().phase(), ScrollPhase::Exhausted);

    let calls = engine.calls();
    assert_eq!(calls[1].0, "scroll");
    assert_eq!(calls[1].1["scroll_id"], "cursor-1");
    assert_eq!(calls[1].1["expire"], "30s");

    assert!(query.clear_scroll(None).await.unwrap());
    assert_eq!(engine.calls()[2].1["scroll_id"], "cursor-2");
}

#[tokio::test]
async fn test_clear_scroll_without_cursor_returns_false() {
    let (connection, engine) = connect(FakeEngine::default());
    let mut query = connection.query();
    assert!(!query.clear_scroll(None).await.unwrap());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_insert_applies_field_whitelist() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query();
    query
        .insert(json!({ "title": "hello", "rogue": true }), Some("7"))
        .await
        .unwrap();

    let (op, detail) = &engine.calls()[0];
    assert_eq!(op, "create_doc");
    assert_eq!(detail["id"], "7");
    assert_eq!(detail["body"], json!({ "title": "hello" }));
}

#[tokio::test]
async fn test_count_reuses_prior_search_total() {
    let (connection, engine) =
        connect(FakeEngine::default().with_response("search", hits(42, vec![])));

    let mut query = connection.query().where_eq("status", "published");
    query.search().await.unwrap();
    let total = query.count().await.unwrap();

    assert_eq!(total, 42);
    // One search, no separate count round trip.
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_count_without_prior_search_hits_the_count_endpoint() {
    let (connection, engine) =
        connect(FakeEngine::default().with_response("count", json!({ "count": 7 })));

    let mut query = connection.query().where_eq("status", "published");
    let total = query.count().await.unwrap();

    assert_eq!(total, 7);
    assert_eq!(engine.calls()[0].0, "count");
}

#[tokio::test]
async fn test_aggregation_reads_scalar_at_fixed_path() {
    let (connection, engine) = connect(FakeEngine::default().with_response(
        "search",
        json!({
            "hits": { "total": 5, "hits": [] },
            "aggregations": { "total": { "max": { "value": 42.0 } } }
        }),
    ));

    let mut query = connection.query().where_eq("status", "published");
    let max = query.max("views").await.unwrap();

    assert_eq!(max, Some(42.0));
    let body = &engine.calls()[0].1["body"];
    assert_eq!(
        body["aggregations"]["total"]["max"]["field"],
        "views"
    );
}

#[tokio::test]
async fn test_bulk_interleaves_action_and_document_lines() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query();
    query
        .bulk(vec![
            BulkOperation::index_with_id("1", json!({ "title": "a", "rogue": 1 })),
            BulkOperation::update("2", json!({ "views": 9 })),
            BulkOperation::delete("3"),
        ])
        .await
        .unwrap();

    let lines = engine.calls()[0].1.as_array().cloned().unwrap();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        json!({ "index": { "_index": "articles", "_type": "post", "_id": "1" } })
    );
    assert_eq!(lines[1], json!({ "title": "a" }));
    assert_eq!(lines[2]["update"]["_id"], "2");
    assert_eq!(lines[3], json!({ "doc": { "views": 9 } }));
    assert_eq!(lines[4]["delete"]["_id"], "3");
}

#[tokio::test]
async fn test_empty_bulk_is_a_noop() {
    let (connection, engine) = connect(FakeEngine::default());
    let mut query = connection.query();
    assert_eq!(query.bulk(Vec::new()).await.unwrap(), json!({}));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_find_injects_id_and_maps_not_found_to_none() {
    let (connection, _engine) = connect(FakeEngine::default().with_response(
        "get",
        json!({ "found": true, "_id": "9", "_source": { "title": "a" } }),
    ));

    let mut query = connection.query();
    let doc = query.find("9").await.unwrap().unwrap();
    assert_eq!(doc["_id"], "9");
    assert_eq!(doc["title"], "a");

    assert!(query.find("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_where_in_and_null_checks_round_trip_through_delete() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection
        .query()
        .where_in("status", vec![json!("a"), json!("b")], Boolean::And)
        .is_null("deleted_at", Boolean::And);
    query.delete().await.unwrap();

    let body = &engine.calls()[0].1["body"];
    let group = body.pointer("/query/bool/must/0/bool/must").unwrap();
    assert_eq!(group[0]["bool"]["should"].as_array().unwrap().len(), 2);
    assert_eq!(group[1]["missing"]["field"], "deleted_at");
}

#[tokio::test]
async fn test_alias_preferred_as_write_target() {
    let aliased = SearchConfig::new("articles", "post").with_index(
        "articles",
        IndexConfig::new(vec!["http://localhost:9200".to_string()])
            .with_alias("articles-write")
            .with_type("post", TypeConfig::new().with_fields(vec!["title".to_string()])),
    );
    let engine = Arc::new(FakeEngine::default());
    let connection = Connection::with_engine(aliased, engine.clone());

    let mut query = connection.query().where_eq("title", "x");
    query.delete().await.unwrap();

    assert_eq!(engine.calls()[0].1["index"], "articles-write");
}

#[tokio::test]
async fn test_validate_reports_engine_verdict() {
    let (connection, _engine) =
        connect(FakeEngine::default().with_response("validate_query", json!({ "valid": true })));
    let mut query = connection.query().where_eq("status", "x");
    assert!(query.validate().await.unwrap());
}

#[tokio::test]
async fn test_index_manager_creates_index_from_configuration() {
    let (connection, engine) = connect(FakeEngine::default());

    connection.indices().create().await.unwrap();

    let (op, detail) = &engine.calls()[0];
    assert_eq!(op, "create_index");
    assert_eq!(detail["index"], "articles");
    assert!(detail["body"]["mappings"].get("post").is_some());
}

#[tokio::test]
async fn test_index_manager_migrate_swaps_alias_atomically() {
    let (connection, engine) = connect(FakeEngine::default());

    connection
        .indices()
        .migrate("articles-read", "articles-v2")
        .await
        .unwrap();

    let actions = engine.calls()[0].1["actions"].as_array().cloned().unwrap();
    assert_eq!(actions[0]["remove"]["index"], "articles");
    assert_eq!(actions[1]["add"]["index"], "articles-v2");
    assert_eq!(actions[1]["add"]["alias"], "articles-read");
}

#[tokio::test]
async fn test_index_manager_alias_requires_name_or_configuration() {
    let (connection, _engine) = connect(FakeEngine::default());
    let err = connection.indices().create_alias(None).await.unwrap_err();
    assert!(matches!(err, EsError::Configuration(_)));
}

#[tokio::test]
async fn test_mget_builds_doc_descriptors() {
    let (connection, engine) = connect(FakeEngine::default());

    let mut query = connection.query();
    let mut item = esquery::MgetItem::new("articles", "1");
    item.include = vec!["title".to_string()];
    query
        .mget(vec![item, esquery::MgetItem::new("articles", "2")])
        .await
        .unwrap();

    let docs = engine.calls()[0].1["docs"].as_array().cloned().unwrap();
    assert_eq!(docs[0]["_index"], "articles");
    assert_eq!(docs[0]["_source"], json!(["title"]));
    assert_eq!(docs[1]["_id"], "2");
    assert!(docs[1].get("_source").is_none());
}
