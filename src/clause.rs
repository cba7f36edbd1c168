//! Clause builders: leaf conditions of the boolean query tree.

use serde_json::{json, Map, Value};

/// Comparison operator accepted by the generic `where` entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equality, rendered as a phrase-typed match.
    Eq,
    /// Inequality, a phrase match nested under `must_not`.
    Ne,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// SQL `like`, rendered as a wildcard query.
    Like,
}

impl Operator {
    /// Parse an SQL-style operator token. Unknown tokens fall back to `Eq`.
    pub fn parse(token: &str) -> Self {
        match token {
            "!=" | "<>" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            "like" | "LIKE" => Self::Like,
            _ => Self::Eq,
        }
    }
}

/// Placement of an operator-driven clause: `And` appends to `must`,
/// `Or` appends to `should`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    /// All conditions must hold.
    #[default]
    And,
    /// At least one condition should hold.
    Or,
}

impl Boolean {
    /// Boolean slot this placement maps to.
    pub fn slot(self) -> BoolSlot {
        match self {
            Self::And => BoolSlot::Must,
            Self::Or => BoolSlot::Should,
        }
    }
}

/// Slot of a boolean group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolSlot {
    /// Scoring conjunction.
    Must,
    /// Scoring disjunction.
    Should,
    /// Negation.
    MustNot,
    /// Non-scoring filter context.
    Filter,
}

impl BoolSlot {
    /// Engine-side key for this slot.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Must => "must",
            Self::Should => "should",
            Self::MustNot => "must_not",
            Self::Filter => "filter",
        }
    }
}

/// Translate SQL wildcard syntax to engine wildcard syntax
/// (`_` becomes `?`, `%` becomes `*`).
pub fn like_pattern(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '_' => '?',
            '%' => '*',
            other => other,
        })
        .collect()
}

/// Range condition with explicit bounds and inclusivity flags.
///
/// The unused bound stays `null` with its inclusivity flag left `true`,
/// matching the engine's default.
#[derive(Debug, Clone)]
pub struct RangeSpec {
    /// Field the range applies to.
    pub field: String,
    /// Lower bound, `Value::Null` when unbounded.
    pub from: Value,
    /// Upper bound, `Value::Null` when unbounded.
    pub to: Value,
    /// Whether the lower bound is inclusive.
    pub include_lower: bool,
    /// Whether the upper bound is inclusive.
    pub include_upper: bool,
    /// Additional range parameters such as `format` or `time_zone`.
    pub extra: Map<String, Value>,
}

impl RangeSpec {
    /// Lower-bounded range; `inclusive` derives from the operator
    /// (`>=` includes the bound, `>` does not).
    pub fn above(field: impl Into<String>, value: impl Into<Value>, inclusive: bool) -> Self {
        Self {
            field: field.into(),
            from: value.into(),
            to: Value::Null,
            include_lower: inclusive,
            include_upper: true,
            extra: Map::new(),
        }
    }

    /// Upper-bounded range; `inclusive` derives from the operator
    /// (`<=` includes the bound, `<` does not).
    pub fn below(field: impl Into<String>, value: impl Into<Value>, inclusive: bool) -> Self {
        Self {
            field: field.into(),
            from: Value::Null,
            to: value.into(),
            include_lower: true,
            include_upper: inclusive,
            extra: Map::new(),
        }
    }

    /// Range inclusive on both ends.
    pub fn between(
        field: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
            include_lower: true,
            include_upper: true,
            extra: Map::new(),
        }
    }

    fn to_json(&self) -> Value {
        let mut inner = Map::new();
        inner.insert("from".to_string(), self.from.clone());
        inner.insert("to".to_string(), self.to.clone());
        inner.insert("include_lower".to_string(), Value::Bool(self.include_lower));
        inner.insert("include_upper".to_string(), Value::Bool(self.include_upper));
        for (key, value) in &self.extra {
            inner.insert(key.clone(), value.clone());
        }
        json!({ "range": { self.field.clone(): inner } })
    }
}

/// One leaf condition in engine query-expression form.
#[derive(Debug, Clone)]
pub enum Clause {
    /// Full-text match on a field.
    Match {
        /// Field to search.
        field: String,
        /// Search value.
        value: Value,
    },
    /// Phrase-typed match, the rendering of the `=` operator.
    Phrase {
        /// Field to search.
        field: String,
        /// Phrase value.
        value: Value,
    },
    /// Explicit `match_phrase` query with optional slop.
    MatchPhrase {
        /// Field to search.
        field: String,
        /// Phrase value.
        value: Value,
        /// Allowed token gap, folded into the fragment only when > 0.
        slop: i64,
    },
    /// Match all documents, optionally parameterized.
    MatchAll {
        /// Optional field/value pair forwarded to the fragment.
        pair: Option<(String, Value)>,
    },
    /// Match across several fields, `most_fields` scoring.
    MultiMatch {
        /// Fields to search.
        fields: Vec<String>,
        /// Search value.
        value: Value,
    },
    /// Exact term match; a list value embeds a `minimum_match` threshold.
    Term {
        /// Field to match.
        field: String,
        /// Exact value, or list of values.
        value: Value,
        /// Threshold embedded only when `value` is a list.
        minimum_match: i64,
    },
    /// Exact match on any of several values.
    Terms {
        /// Field to match.
        field: String,
        /// Values to match.
        values: Vec<Value>,
    },
    /// Prefix match.
    Prefix {
        /// Field to match.
        field: String,
        /// Prefix value.
        value: Value,
    },
    /// Wildcard match, pattern in engine syntax.
    Wildcard {
        /// Field to match.
        field: String,
        /// Engine wildcard pattern.
        pattern: String,
    },
    /// Range condition with inclusivity flags.
    Range(RangeSpec),
    /// Range condition in comparator-pair form (`gte`/`lte` by default).
    RangeBounds {
        /// Field the range applies to.
        field: String,
        /// Lower comparator name and bound.
        lower: (String, Value),
        /// Upper comparator name and bound.
        upper: (String, Value),
        /// Additional range parameters.
        extra: Map<String, Value>,
    },
    /// Identifier set membership.
    Ids {
        /// Document identifiers.
        values: Vec<String>,
    },
    /// Query-string query, optionally restricted to fields.
    QueryString {
        /// Query text.
        query: String,
        /// Fields to search; empty means engine default.
        fields: Vec<String>,
    },
    /// Field-is-absent condition.
    Missing {
        /// Field that must be absent.
        field: String,
    },
    /// Composite boolean group.
    Bool(BoolGroup),
    /// Raw JSON fragment passed through unchanged.
    Raw(Value),
}

impl Clause {
    /// Render the clause as an engine query fragment.
    pub fn to_json(&self) -> Value {
        match self {
            Clause::Match { field, value } => {
                json!({ "match": { field.clone(): value.clone() } })
            }
            Clause::Phrase { field, value } => {
                json!({ "match": { field.clone(): { "query": value.clone(), "type": "phrase" } } })
            }
            Clause::MatchPhrase { field, value, slop } => {
                let mut inner = json!({ "query": value.clone() });
                if *slop > 0 {
                    inner["slop"] = json!(slop);
                }
                json!({ "match_phrase": { field.clone(): inner } })
            }
            Clause::MatchAll { pair } => match pair {
                Some((field, value)) => {
                    json!({ "match_all": { field.clone(): value.clone() } })
                }
                None => json!({ "match_all": {} }),
            },
            Clause::MultiMatch { fields, value } => json!({
                "multi_match": {
                    "type": "most_fields",
                    "fields": fields,
                    "query": value.clone()
                }
            }),
            Clause::Term {
                field,
                value,
                minimum_match,
            } => {
                let mut inner = Map::new();
                inner.insert(field.clone(), value.clone());
                if value.is_array() {
                    inner.insert("minimum_match".to_string(), json!(minimum_match));
                }
                json!({ "term": inner })
            }
            Clause::Terms { field, values } => {
                json!({ "terms": { field.clone(): values } })
            }
            Clause::Prefix { field, value } => {
                json!({ "prefix": { field.clone(): { "value": value.clone() } } })
            }
            Clause::Wildcard { field, pattern } => {
                json!({ "wildcard": { field.clone(): pattern.clone() } })
            }
            Clause::Range(spec) => spec.to_json(),
            Clause::RangeBounds {
                field,
                lower,
                upper,
                extra,
            } => {
                let mut inner = Map::new();
                inner.insert(lower.0.clone(), lower.1.clone());
                inner.insert(upper.0.clone(), upper.1.clone());
                for (key, value) in extra {
                    inner.insert(key.clone(), value.clone());
                }
                json!({ "range": { field.clone(): inner } })
            }
            Clause::Ids { values } => json!({ "ids": { "values": values } }),
            Clause::QueryString { query, fields } => {
                let mut inner = json!({ "query": query.clone() });
                if !fields.is_empty() {
                    inner["fields"] = json!(fields);
                }
                json!({ "query_string": inner })
            }
            Clause::Missing { field } => json!({ "missing": { "field": field.clone() } }),
            Clause::Bool(group) => json!({ "bool": group.to_json() }),
            Clause::Raw(value) => value.clone(),
        }
    }
}

/// Composite boolean clause with `must` / `should` / `must_not` / `filter`
/// slots. Clauses accumulate in call order.
#[derive(Debug, Clone, Default)]
pub struct BoolGroup {
    /// Scoring conjunction.
    pub must: Vec<Clause>,
    /// Scoring disjunction.
    pub should: Vec<Clause>,
    /// Negation.
    pub must_not: Vec<Clause>,
    /// Non-scoring filter context.
    pub filter: Vec<Clause>,
}

impl BoolGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no slot holds a clause.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
    }

    /// Append a clause to the given slot.
    pub fn push(&mut self, slot: BoolSlot, clause: Clause) {
        self.slot_mut(slot).push(clause);
    }

    fn slot_mut(&mut self, slot: BoolSlot) -> &mut Vec<Clause> {
        match slot {
            BoolSlot::Must => &mut self.must,
            BoolSlot::Should => &mut self.should,
            BoolSlot::MustNot => &mut self.must_not,
            BoolSlot::Filter => &mut self.filter,
        }
    }

    /// Render the group body (slot keys only for non-empty slots).
    pub fn to_json(&self) -> Value {
        let mut group = Map::new();
        for (slot, clauses) in [
            (BoolSlot::Must, &self.must),
            (BoolSlot::Should, &self.should),
            (BoolSlot::MustNot, &self.must_not),
            (BoolSlot::Filter, &self.filter),
        ] {
            if !clauses.is_empty() {
                group.insert(
                    slot.as_str().to_string(),
                    Value::Array(clauses.iter().map(Clause::to_json).collect()),
                );
            }
        }
        Value::Object(group)
    }
}
