//! Output normalization of raw engine responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized search response: the engine's hit array flattened into a
/// record list plus metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Stored documents in hit order, each with its `_id` injected.
    pub records: Vec<Map<String, Value>>,
    /// Total matching documents reported by the engine.
    pub total: u64,
    /// Scroll cursor, present when the search was scrolled.
    pub scroll_id: Option<String>,
}

impl SearchResult {
    /// Normalize a raw search or scroll response.
    ///
    /// A zero-hit response yields an empty record list, not an error.
    /// Both the legacy integer `hits.total` and the object form
    /// `hits.total.value` are accepted.
    pub fn from_raw(raw: &Value) -> Self {
        let total = raw
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .or_else(|| raw.pointer("/hits/total").and_then(Value::as_u64))
            .unwrap_or(0);

        let records = raw
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .map(|hit| {
                        let mut doc = hit
                            .get("_source")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default();
                        if let Some(id) = hit.get("_id") {
                            doc.insert("_id".to_string(), id.clone());
                        }
                        doc
                    })
                    .collect()
            })
            .unwrap_or_default();

        let scroll_id = raw
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        Self {
            records,
            total,
            scroll_id,
        }
    }

    /// True when no record was returned.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record, if any.
    pub fn first(&self) -> Option<&Map<String, Value>> {
        self.records.first()
    }
}

/// Scalar metric of an aggregation response, read at the fixed path
/// `aggregations.total.<metric>.value`.
pub(crate) fn metric_value(raw: &Value, metric: &str) -> Option<f64> {
    raw.pointer(&format!("/aggregations/total/{metric}/value"))
        .and_then(Value::as_f64)
}
