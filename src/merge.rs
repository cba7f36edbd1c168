//! Deep structural merge for JSON query fragments.

use serde_json::Value;

/// Merge `incoming` into `base`.
///
/// Maps merge recursively key by key, arrays concatenate (base first,
/// duplicates preserved), and any other collision overwrites the base value.
/// The scalar overwrite makes the merge non-associative at scalar leaves;
/// that last-write-wins behavior is intentional and relied upon by the
/// where-tree accumulator.
pub fn merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(incoming)) => base.extend(incoming),
        (slot, incoming) => *slot = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_disjoint_keys() {
        let mut base = json!({ "a": 1 });
        merge(&mut base, json!({ "b": 2 }));
        assert_eq!(base, json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn test_merge_recurses_into_maps() {
        let mut base = json!({ "query": { "bool": { "must": [1] } } });
        merge(&mut base, json!({ "query": { "bool": { "should": [2] } } }));
        assert_eq!(
            base,
            json!({ "query": { "bool": { "must": [1], "should": [2] } } })
        );
    }

    #[test]
    fn test_merge_concatenates_arrays_in_order() {
        let mut base = json!({ "must": [1, 2] });
        merge(&mut base, json!({ "must": [2, 3] }));
        assert_eq!(base, json!({ "must": [1, 2, 2, 3] }));
    }

    #[test]
    fn test_merge_scalar_leaf_is_last_write_wins() {
        // Known quirk: map values sharing a scalar leaf key overwrite.
        let mut base = json!({ "match": { "name": "alice" } });
        merge(&mut base, json!({ "match": { "name": "bob" } }));
        assert_eq!(base, json!({ "match": { "name": "bob" } }));
    }

    #[test]
    fn test_merge_disjoint_top_level_keys_commute() {
        let a = json!({ "query": { "match": { "x": 1 } } });
        let b = json!({ "filter": { "term": { "y": 2 } } });

        let mut left = a.clone();
        merge(&mut left, b.clone());
        let mut right = b;
        merge(&mut right, a);

        assert_eq!(left["query"], right["query"]);
        assert_eq!(left["filter"], right["filter"]);
    }

    #[test]
    fn test_merge_copies_one_sided_keys() {
        let mut base = json!({});
        merge(&mut base, json!({ "size": 10 }));
        assert_eq!(base, json!({ "size": 10 }));
    }
}
