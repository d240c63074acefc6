//! Recursive deep-merge of JSON values.
//!
//! Used both by the configuration loader, to combine successive YAML
//! files, and by the audit graph workers, to enrich a record's `com`
//! bucket without clobbering evaluator-supplied fields that happen to
//! share a key with engine bookkeeping.

use serde_json::Value;

/// Recursively merge `b` into `a`, returning a new value. For
/// overlapping keys whose values are both objects, merge recursively;
/// otherwise `b`'s value wins. Neither input is mutated.
pub fn merge_dicts(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(a_map), Value::Object(b_map)) => {
            let mut merged = a_map.clone();
            for (k, b_val) in b_map {
                let next = match merged.get(k) {
                    Some(a_val) => merge_dicts(a_val, b_val),
                    None => b_val.clone(),
                };
                merged.insert(k.clone(), next);
            }
            Value::Object(merged)
        }
        (_, b) => b.clone(),
    }
}
