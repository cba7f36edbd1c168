//! Fluent query builder: where-tree accumulation, request assembly and the
//! terminal search/count/update/delete/bulk operations.

use log::debug;
use serde_json::{json, Map, Value};

use crate::bulk::{BulkAction, BulkOperation};
use crate::clause::{like_pattern, BoolGroup, BoolSlot, Boolean, Clause, Operator, RangeSpec};
use crate::client::{Connection, SearchOptions};
use crate::error::{EsError, Result};
use crate::merge::merge;
use crate::response::{metric_value, SearchResult};
use crate::scroll::ScrollState;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Flavor of a `match_field` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Match against the engine's all-fields pseudo field.
    AllFields,
    /// Full-text match on the given field.
    Field,
    /// Phrase match with an allowed token gap.
    Phrase {
        /// Allowed token gap; folded into the fragment only when > 0.
        slop: i64,
    },
    /// Match all documents.
    MatchAll,
}

/// One entry of a multi-document fetch.
#[derive(Debug, Clone)]
pub struct MgetItem {
    /// Index to fetch from.
    pub index: String,
    /// Optional type.
    pub doc_type: Option<String>,
    /// Document identifier.
    pub id: String,
    /// Source fields to include.
    pub include: Vec<String>,
    /// Source fields to exclude.
    pub exclude: Vec<String>,
}

impl MgetItem {
    /// Fetch one document by index and identifier.
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
            id: id.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    fn to_json(self) -> Value {
        let mut needle = json!({ "_index": self.index, "_id": self.id });
        if let Some(doc_type) = self.doc_type {
            needle["_type"] = json!(doc_type);
        }
        if !self.include.is_empty() && !self.exclude.is_empty() {
            needle["_source"] = json!({ "include": self.include, "exclude": self.exclude });
        } else if !self.include.is_empty() {
            needle["_source"] = json!(self.include);
        }
        needle
    }
}

/// Accumulated boolean query expression for one logical query.
///
/// Bare clauses from the standalone builders deep-merge into the `query`
/// map; operator-driven clauses collect in an inner boolean group rendered
/// under `query.bool.must`. Merging never silently drops a sibling clause;
/// only map values sharing a scalar leaf key overwrite (last write wins).
#[derive(Debug, Clone, Default)]
pub struct WhereTree {
    root: Vec<Clause>,
    group: BoolGroup,
    filter: Vec<Clause>,
}

impl WhereTree {
    /// True when no condition has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.group.is_empty() && self.filter.is_empty()
    }

    /// Add a bare clause at the query root.
    pub fn push_root(&mut self, clause: Clause) {
        self.root.push(clause);
    }

    /// Add a clause to the inner boolean group.
    pub fn push(&mut self, slot: BoolSlot, clause: Clause) {
        self.group.push(slot, clause);
    }

    /// Add a clause to the top-level filter context.
    pub fn push_filter(&mut self, clause: Clause) {
        self.filter.push(clause);
    }

    /// Dispatch one operator-driven condition into the tree.
    pub fn where_with(&mut self, field: &str, operator: Operator, value: Value, boolean: Boolean) {
        let slot = boolean.slot();
        let clause = match operator {
            Operator::Eq => Clause::Phrase {
                field: field.to_string(),
                value,
            },
            Operator::Ne => Clause::Bool(BoolGroup {
                must_not: vec![Clause::Phrase {
                    field: field.to_string(),
                    value,
                }],
                ..BoolGroup::default()
            }),
            Operator::Gt => Clause::Range(RangeSpec::above(field, value, false)),
            Operator::Gte => Clause::Range(RangeSpec::above(field, value, true)),
            Operator::Lt => Clause::Range(RangeSpec::below(field, value, false)),
            Operator::Lte => Clause::Range(RangeSpec::below(field, value, true)),
            Operator::Like => {
                let pattern = match value {
                    Value::String(s) => like_pattern(&s),
                    other => like_pattern(&other.to_string()),
                };
                Clause::Wildcard {
                    field: field.to_string(),
                    pattern,
                }
            }
        };
        self.push(slot, clause);
    }

    /// Expand a value list into an OR-of-phrase-matches group, optionally
    /// wrapped in `must_not`.
    pub fn where_in(&mut self, field: &str, values: Vec<Value>, boolean: Boolean, negated: bool) {
        let matches: Vec<Clause> = values
            .into_iter()
            .map(|value| Clause::Phrase {
                field: field.to_string(),
                value,
            })
            .collect();
        let group = Clause::Bool(BoolGroup {
            should: matches,
            ..BoolGroup::default()
        });
        let clause = if negated {
            Clause::Bool(BoolGroup {
                must_not: vec![group],
                ..BoolGroup::default()
            })
        } else {
            group
        };
        self.push(boolean.slot(), clause);
    }

    /// Add a both-ends-inclusive range over `bounds[0]..bounds[1]`.
    /// Returns `false` without touching the tree when the upper bound is
    /// absent.
    pub fn between(
        &mut self,
        field: &str,
        bounds: &[Value],
        boolean: Boolean,
        negated: bool,
    ) -> bool {
        let (Some(from), Some(to)) = (bounds.first(), bounds.get(1)) else {
            return false;
        };
        let range = Clause::Range(RangeSpec::between(field, from.clone(), to.clone()));
        let clause = if negated {
            Clause::Bool(BoolGroup {
                must_not: vec![range],
                ..BoolGroup::default()
            })
        } else {
            range
        };
        self.push(boolean.slot(), clause);
        true
    }

    /// Add a missing-field condition, optionally negated.
    pub fn null_check(&mut self, field: &str, boolean: Boolean, negated: bool) {
        let missing = Clause::Missing {
            field: field.to_string(),
        };
        let clause = if negated {
            Clause::Bool(BoolGroup {
                must_not: vec![missing],
                ..BoolGroup::default()
            })
        } else {
            missing
        };
        self.push(boolean.slot(), clause);
    }

    /// Render the `query` subtree.
    pub fn to_query(&self) -> Value {
        let mut query = Value::Object(Map::new());
        for clause in &self.root {
            merge(&mut query, clause.to_json());
        }
        if !self.group.is_empty() {
            merge(
                &mut query,
                json!({ "bool": { "must": [{ "bool": self.group.to_json() }] } }),
            );
        }
        query
    }

    /// Render the full request body: `query` plus the filter context.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        if !self.root.is_empty() || !self.group.is_empty() {
            body.insert("query".to_string(), self.to_query());
        }
        if !self.filter.is_empty() {
            let mut filter = Value::Object(Map::new());
            for clause in &self.filter {
                merge(&mut filter, clause.to_json());
            }
            body.insert("filter".to_string(), filter);
        }
        Value::Object(body)
    }
}

pub(crate) fn filter_doc(fields: &[String], doc: Value) -> Map<String, Value> {
    let Value::Object(doc) = doc else {
        return Map::new();
    };
    doc.into_iter()
        .filter(|(key, _)| fields.iter().any(|f| f == key))
        .collect()
}

/// Fluent builder for one logical query.
///
/// Clause methods consume and return the builder; terminal methods take
/// `&mut self`, dispatch the assembled request through the connection's
/// engine and keep the raw response for `count` reuse and scroll release.
#[derive(Debug, Clone)]
pub struct Query {
    connection: Connection,
    index: Option<String>,
    doc_type: Option<String>,
    tree: WhereTree,
    columns: Vec<String>,
    order: Vec<Value>,
    offset: i64,
    limit: i64,
    paging: bool,
    with_version: bool,
    explain: bool,
    aggregations: Map<String, Value>,
    scroll: ScrollState,
    output: Option<Value>,
}

impl Query {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            index: None,
            doc_type: None,
            tree: WhereTree::default(),
            columns: Vec::new(),
            order: Vec::new(),
            offset: 0,
            limit: 10,
            paging: false,
            with_version: false,
            explain: false,
            aggregations: Map::new(),
            scroll: ScrollState::default(),
            output: None,
        }
    }

    // =========================================================================
    // Target selection
    // =========================================================================

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

    /// Resolved index name.
    pub fn index_name(&self) -> &str {
        self.index
            .as_deref()
            .unwrap_or(&self.connection.config().default_index)
    }

    /// Resolved type name.
    pub fn type_name(&self) -> &str {
        self.doc_type
            .as_deref()
            .unwrap_or(&self.connection.config().default_type)
    }

    fn target(&self) -> String {
        let index = self.index_name();
        match self.connection.config().alias(index) {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => index.to_string(),
        }
    }

    /// Configured write-throughput limit for the resolved type.
    pub fn write_limit(&self) -> usize {
        self.connection
            .config()
            .write_limit(self.index_name(), self.type_name())
    }

    // =========================================================================
    // Clause builders
    // =========================================================================

    /// Generic condition with an SQL-style operator
    /// (`=`, `!=`, `<>`, `>`, `>=`, `<`, `<=`, `like`), placed under `must`.
    pub fn where_clause(
        mut self,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.tree
            .where_with(field, Operator::parse(operator), value.into(), Boolean::And);
        self
    }

    /// Equality condition, the default operator.
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_clause(field, "=", value)
    }

    /// Generic condition placed under `should`.
    pub fn or_where(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.tree
            .where_with(field, Operator::parse(operator), value.into(), Boolean::Or);
        self
    }

    /// Set-membership condition: OR of phrase matches over the values.
    pub fn where_in(mut self, field: &str, values: Vec<Value>, boolean: Boolean) -> Self {
        self.tree.where_in(field, values, boolean, false);
        self
    }

    /// Negated set-membership condition.
    pub fn where_not_in(mut self, field: &str, values: Vec<Value>, boolean: Boolean) -> Self {
        self.tree.where_in(field, values, boolean, true);
        self
    }

    /// Inclusive range condition over `bounds[0]..bounds[1]`; a missing
    /// upper bound leaves the builder unchanged.
    pub fn where_between(mut self, field: &str, bounds: Vec<Value>, boolean: Boolean) -> Self {
        self.tree.between(field, &bounds, boolean, false);
        self
    }

    /// Negated inclusive range condition; same missing-bound guard.
    pub fn where_not_between(mut self, field: &str, bounds: Vec<Value>, boolean: Boolean) -> Self {
        self.tree.between(field, &bounds, boolean, true);
        self
    }

    /// Field-is-absent condition.
    pub fn is_null(mut self, field: &str, boolean: Boolean) -> Self {
        self.tree.null_check(field, boolean, false);
        self
    }

    /// Field-is-present condition.
    pub fn is_not_null(mut self, field: &str, boolean: Boolean) -> Self {
        self.tree.null_check(field, boolean, true);
        self
    }

    /// Full-text match clause in the given mode.
    pub fn match_field(mut self, field: &str, value: impl Into<Value>, mode: MatchMode) -> Self {
        let value = value.into();
        let clause = match mode {
            MatchMode::AllFields => Clause::Match {
                field: "_all".to_string(),
                value,
            },
            MatchMode::Field => Clause::Match {
                field: field.to_string(),
                value,
            },
            MatchMode::Phrase { slop } => Clause::MatchPhrase {
                field: field.to_string(),
                value,
                slop,
            },
            MatchMode::MatchAll => Clause::MatchAll {
                pair: if !field.is_empty() && !value.is_null() {
                    Some((field.to_string(), value))
                } else {
                    None
                },
            },
        };
        self.tree.push_root(clause);
        self
    }

    /// Match across several fields with `most_fields` scoring.
    pub fn multi_match(mut self, fields: Vec<String>, value: impl Into<Value>) -> Self {
        self.tree.push_root(Clause::MultiMatch {
            fields,
            value: value.into(),
        });
        self
    }

    /// Exact term condition; a list value embeds `minimum_match`.
    pub fn term(
        mut self,
        field: &str,
        value: impl Into<Value>,
        minimum_match: Option<i64>,
    ) -> Self {
        self.tree.push_root(Clause::Term {
            field: field.to_string(),
            value: value.into(),
            minimum_match: minimum_match.unwrap_or(1),
        });
        self
    }

    /// Exact match on any of several values.
    pub fn terms(mut self, field: &str, values: Vec<Value>) -> Self {
        self.tree.push_root(Clause::Terms {
            field: field.to_string(),
            values,
        });
        self
    }

    /// Prefix condition.
    pub fn prefix(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.tree.push_root(Clause::Prefix {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Range condition in comparator-pair form; comparators default to
    /// `gte`/`lte` (inclusive on both ends). A missing bound leaves the
    /// builder unchanged.
    pub fn range(
        mut self,
        field: &str,
        bounds: Vec<Value>,
        operators: Option<(&str, &str)>,
        extra: Option<Map<String, Value>>,
    ) -> Self {
        let (Some(low), Some(high)) = (bounds.first(), bounds.get(1)) else {
            return self;
        };
        let (lower_op, upper_op) = operators.unwrap_or(("gte", "lte"));
        self.tree.push_root(Clause::RangeBounds {
            field: field.to_string(),
            lower: (lower_op.to_string(), low.clone()),
            upper: (upper_op.to_string(), high.clone()),
            extra: extra.unwrap_or_default(),
        });
        self
    }

    /// Identifier set-membership condition.
    pub fn ids(mut self, values: Vec<String>) -> Self {
        self.tree.push_root(Clause::Ids { values });
        self
    }

    /// Query-string condition, optionally restricted to fields.
    pub fn query_string(mut self, query: impl Into<String>, fields: Vec<String>) -> Self {
        self.tree.push_root(Clause::QueryString {
            query: query.into(),
            fields,
        });
        self
    }

    /// Bare boolean clause: an exact term under the given slot.
    pub fn bool_clause(mut self, field: &str, value: impl Into<Value>, slot: BoolSlot) -> Self {
        let mut group = BoolGroup::new();
        group.push(
            slot,
            Clause::Term {
                field: field.to_string(),
                value: value.into(),
                minimum_match: 1,
            },
        );
        self.tree.push_root(Clause::Bool(group));
        self
    }

    /// Non-scoring term filter at the top level of the body.
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.tree.push_filter(Clause::Term {
            field: field.to_string(),
            value: value.into(),
            minimum_match: 1,
        });
        self
    }

    /// Raw query fragment deep-merged into the tree as-is.
    pub fn raw(mut self, fragment: Value) -> Self {
        self.tree.push_root(Clause::Raw(fragment));
        self
    }

    // =========================================================================
    // Projection, ordering, pagination, scroll
    // =========================================================================

    /// Project only the given source fields.
    pub fn select(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Add a sort field.
    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.order
            .push(json!({ field: { "order": order.as_str() } }));
        self
    }

    /// Enable from/size pagination.
    pub fn paginate(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self.paging = true;
        self
    }

    /// Include document versions in the response.
    pub fn with_version(mut self) -> Self {
        self.with_version = true;
        self
    }

    /// Ask the engine to explain scoring.
    pub fn explain(mut self) -> Self {
        self.explain = true;
        self
    }

    /// Enter scroll mode. The requested size is divided by the index's
    /// shard count to obtain the per-request batch size.
    pub fn scroll(mut self, size: i64, expire: &str, search_type: Option<&str>) -> Self {
        let shards = self.connection.config().shards(self.index_name());
        self.scroll.configure(size, shards, expire, search_type);
        self
    }

    /// Scroll bookkeeping for this query.
    pub fn scroll_state(&self) -> &ScrollState {
        &self.scroll
    }

    /// Accumulated where tree.
    pub fn tree(&self) -> &WhereTree {
        &self.tree
    }

    // =========================================================================
    // Request assembly
    // =========================================================================

    fn assemble(&self) -> (Value, SearchOptions) {
        let mut body = self.tree.to_body();
        if self.with_version {
            merge(&mut body, json!({ "version": true }));
        }
        if !self.columns.is_empty() {
            merge(&mut body, json!({ "_source": { "includes": &self.columns } }));
        }
        if !self.aggregations.is_empty() {
            merge(&mut body, json!({ "aggregations": &self.aggregations }));
        }
        if self.paging {
            merge(&mut body, json!({ "from": self.offset, "size": self.limit }));
        }
        // A scroll batch size overrides plain pagination.
        if let Some(size) = self.scroll.batch_size() {
            merge(&mut body, json!({ "size": size }));
        }
        if !self.order.is_empty() {
            merge(&mut body, json!({ "sort": &self.order }));
        }
        let options = SearchOptions {
            search_type: self.scroll.search_type().map(|s| s.to_string()),
            scroll: self.scroll.expire().map(|s| s.to_string()),
            explain: self.explain,
        };
        (body, options)
    }

    /// The request body this builder would send, for inspection.
    pub fn body(&self) -> Value {
        self.assemble().0
    }

    async fn execute(&mut self) -> Result<Value> {
        let (body, options) = self.assemble();
        let target = self.target();
        let doc_type = self.type_name().to_string();
        if self.connection.config().debug {
            debug!("search {target}/{doc_type}: {body}");
        }
        let raw = self
            .connection
            .engine()
            .search(&target, &doc_type, body, &options)
            .await?;
        if self.scroll.is_active() {
            self.scroll.record_response(&raw);
        }
        self.output = Some(raw.clone());
        Ok(raw)
    }

    // =========================================================================
    // Terminal operations
    // =========================================================================

    /// Execute the search and normalize the response.
    pub async fn search(&mut self) -> Result<SearchResult> {
        let raw = self.execute().await?;
        Ok(SearchResult::from_raw(&raw))
    }

    /// Execute the search and return the first record.
    pub async fn first(&mut self) -> Result<Option<Map<String, Value>>> {
        let result = self.search().await?;
        Ok(result.records.into_iter().next())
    }

    /// Count matching documents. Reuses `hits.total` from a prior response
    /// when available, avoiding a second round trip.
    pub async fn count(&mut self) -> Result<u64> {
        let cached = self.output.as_ref().and_then(|output| {
            output
                .pointer("/hits/total/value")
                .and_then(Value::as_u64)
                .or_else(|| output.pointer("/hits/total").and_then(Value::as_u64))
        });
        if let Some(total) = cached {
            return Ok(total);
        }
        let target = self.target();
        let doc_type = self.type_name().to_string();
        let result = self
            .connection
            .engine()
            .count(&target, &doc_type, self.tree.to_body())
            .await?;
        Ok(result.get("count").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Maximum of a field over matching documents.
    pub async fn max(&mut self, field: &str) -> Result<Option<f64>> {
        self.aggregate("max", field).await
    }

    /// Minimum of a field over matching documents.
    pub async fn min(&mut self, field: &str) -> Result<Option<f64>> {
        self.aggregate("min", field).await
    }

    /// Sum of a field over matching documents.
    pub async fn sum(&mut self, field: &str) -> Result<Option<f64>> {
        self.aggregate("sum", field).await
    }

    /// Average of a field over matching documents.
    pub async fn avg(&mut self, field: &str) -> Result<Option<f64>> {
        self.aggregate("avg", field).await
    }

    async fn aggregate(&mut self, metric: &str, field: &str) -> Result<Option<f64>> {
        self.aggregations = Map::new();
        self.aggregations
            .insert("total".to_string(), json!({ metric: { "field": field } }));
        let raw = self.execute().await?;
        Ok(metric_value(&raw, metric))
    }

    /// Update every matching document with the whitelisted fields of `doc`
    /// via a parameterized script. An empty where tree is a no-op guard
    /// against accidental full-index mutation.
    pub async fn update(&mut self, doc: Value) -> Result<Value> {
        if self.tree.is_empty() {
            return Ok(json!({}));
        }
        let params = self.filter_fields(doc)?;
        let assignments = params
            .keys()
            .map(|key| format!("ctx._source.{key} = params.{key}"))
            .collect::<Vec<_>>()
            .join(";");
        let body = json!({
            "conflicts": "proceed",
            "query": self.tree.to_query(),
            "script": {
                "lang": "painless",
                "inline": assignments,
                "params": params
            }
        });
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .update_by_query(&target, &doc_type, body)
            .await
    }

    /// Add `amount` to a numeric field on every matching document.
    pub async fn increase(&mut self, field: &str, amount: i64) -> Result<Value> {
        self.adjust(field, amount, "+=").await
    }

    /// Subtract `amount` from a numeric field on every matching document.
    pub async fn decrease(&mut self, field: &str, amount: i64) -> Result<Value> {
        self.adjust(field, amount, "-=").await
    }

    async fn adjust(&mut self, field: &str, amount: i64, operator: &str) -> Result<Value> {
        if field.is_empty() || self.tree.is_empty() {
            return Ok(json!({}));
        }
        // The amount is always a script parameter, never interpolated.
        let body = json!({
            "conflicts": "proceed",
            "query": self.tree.to_query(),
            "script": {
                "lang": "painless",
                "inline": format!("ctx._source.{field} {operator} params.count"),
                "params": { "count": amount }
            }
        });
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .update_by_query(&target, &doc_type, body)
            .await
    }

    /// Delete every matching document. An empty where tree is a no-op.
    pub async fn delete(&mut self) -> Result<Value> {
        if self.tree.is_empty() {
            return Ok(json!({}));
        }
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .delete_by_query(&target, &doc_type, self.tree.to_body())
            .await
    }

    /// Create a document, failing if the identifier exists.
    pub async fn insert(&mut self, doc: Value, id: Option<&str>) -> Result<Value> {
        let body = Value::Object(self.filter_fields(doc)?);
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .create_doc(&target, &doc_type, id, body)
            .await
    }

    /// Index a document, replacing any existing one.
    pub async fn insert_or_cover(&mut self, doc: Value, id: Option<&str>) -> Result<Value> {
        let body = Value::Object(self.filter_fields(doc)?);
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .index_doc(&target, &doc_type, id, body)
            .await
    }

    /// Partially update a document by identifier.
    pub async fn update_by_id(&mut self, doc: Value, id: &str) -> Result<Value> {
        let body = json!({ "doc": self.filter_fields(doc)? });
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .update_doc(&target, &doc_type, id, body)
            .await
    }

    /// Scripted upsert: update the document's whitelisted fields, creating
    /// it when absent.
    pub async fn insert_or_update(&mut self, doc: Value, id: &str) -> Result<Value> {
        let params = self.filter_fields(doc)?;
        let assignments = params
            .keys()
            .map(|key| format!("ctx._source.{key} = params.{key}"))
            .collect::<Vec<_>>()
            .join(";");
        let body = json!({
            "conflicts": "proceed",
            "script": {
                "lang": "painless",
                "inline": assignments,
                "params": params
            },
            "upsert": { "id": id }
        });
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .update_doc(&target, &doc_type, id, body)
            .await
    }

    /// Delete a document by identifier.
    pub async fn delete_by_id(&mut self, id: &str) -> Result<Value> {
        let target = self.target();
        let doc_type = self.type_name().to_string();
        self.connection
            .engine()
            .delete_doc(&target, &doc_type, id)
            .await
    }

    /// Fetch a document by identifier; `Ok(None)` when it does not exist.
    pub async fn find(&mut self, id: &str) -> Result<Option<Map<String, Value>>> {
        let target = self.target();
        let doc_type = self.type_name().to_string();
        match self.connection.engine().get(&target, &doc_type, id).await {
            Ok(raw) => {
                if !raw.get("found").and_then(Value::as_bool).unwrap_or(true) {
                    return Ok(None);
                }
                let mut doc = raw
                    .get("_source")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if let Some(id_value) = raw.get("_id") {
                    doc.insert("_id".to_string(), id_value.clone());
                }
                Ok(Some(doc))
            }
            Err(EsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch several documents in one round trip.
    pub async fn mget(&mut self, items: Vec<MgetItem>) -> Result<Value> {
        let docs: Vec<Value> = items.into_iter().map(MgetItem::to_json).collect();
        self.connection.engine().mget(json!({ "docs": docs })).await
    }

    /// Execute bulk actions against the resolved target. Documents pass
    /// through the field whitelist; empty input is a no-op.
    pub async fn bulk(&mut self, operations: Vec<BulkOperation>) -> Result<Value> {
        if operations.is_empty() {
            return Ok(json!({}));
        }
        let target = self.target();
        let doc_type = self.type_name().to_string();
        let mut lines = Vec::with_capacity(operations.len() * 2);
        for operation in operations {
            lines.push(operation.action_line(&target, &doc_type));
            if operation.action != BulkAction::Delete {
                let filtered = self.filter_fields(operation.doc.clone())?;
                if let Some(doc_line) = operation.doc_line(filtered) {
                    lines.push(doc_line);
                }
            }
        }
        self.connection.engine().bulk(lines).await
    }

    /// Validate the accumulated query without executing it.
    pub async fn validate(&mut self) -> Result<bool> {
        let target = self.target();
        let doc_type = self.type_name().to_string();
        let raw = self
            .connection
            .engine()
            .validate_query(&target, &doc_type, self.tree.to_body())
            .await?;
        Ok(raw.get("valid").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Continue a scrolled search with the last known cursor or an explicit
    /// override. With no cursor anywhere this is a no-op returning an empty
    /// result without contacting the engine.
    pub async fn search_by_scroll_id(&mut self, scroll_id: Option<&str>) -> Result<SearchResult> {
        let id = scroll_id
            .map(|s| s.to_string())
            .or_else(|| self.scroll.scroll_id().map(|s| s.to_string()));
        let Some(id) = id else {
            debug!("scroll continuation requested without a cursor; skipping");
            return Ok(SearchResult::default());
        };
        let expire = self.scroll.expire().unwrap_or("30s").to_string();
        let raw = self.connection.engine().scroll(&id, &expire).await?;
        self.scroll.record_response(&raw);
        self.output = Some(raw.clone());
        Ok(SearchResult::from_raw(&raw))
    }

    /// Release the last known scroll cursor or an explicit override.
    /// Returns `false` when there is nothing to release or the cursor is
    /// already gone.
    pub async fn clear_scroll(&mut self, scroll_id: Option<&str>) -> Result<bool> {
        let id = scroll_id
            .map(|s| s.to_string())
            .or_else(|| self.scroll.scroll_id().map(|s| s.to_string()));
        let Some(id) = id else {
            return Ok(false);
        };
        match self.connection.engine().clear_scroll(&id).await {
            Ok(raw) => Ok(raw.get("succeeded").and_then(Value::as_bool).unwrap_or(true)),
            Err(EsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Apply the configured field whitelist to a document. Keys outside the
    /// whitelist are dropped silently; an empty whitelist drops everything.
    pub fn filter_fields(&self, doc: Value) -> Result<Map<String, Value>> {
        let fields = self
            .connection
            .config()
            .type_config(self.index_name(), self.type_name())?
            .fields
            .clone();
        Ok(filter_doc(&fields, doc))
    }
}
