//! Canonical JSON encoding and content-addressing (spec.md §3, §8).
//!
//! Metadata documents are deduplicated by `sha256(canonical(value))`; the
//! canonical form sorts object keys and drops insignificant whitespace so
//! that two JSON values with the same logical content always hash the same.

use sha2::{Digest, Sha256};

/// Re-serializes `value` with object keys sorted recursively and no
/// whitespace. `serde_json::Value`'s `Map` is a `BTreeMap` under the
/// `preserve_order` feature being *off* (the default), so keys are already
/// lexicographically ordered on serialization; this function exists to make
/// that guarantee explicit and independent of serde_json's default feature
/// flags.
pub fn canonicalize(value: &serde_json::Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("Value serialization is infallible")
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[k]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 of the canonical encoding of `value`, as raw bytes (32 bytes).
pub fn content_hash(value: &serde_json::Value) -> [u8; 32] {
    let canonical = canonicalize(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

pub fn content_hash_hex(value: &serde_json::Value) -> String {
    hex::encode(content_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let a = json!({"outer": {"z": 1, "a": 2}});
        let b = json!({"outer": {"a": 2, "z": 1}});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn distinct_values_hash_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let v = json!({"a": [1, 2, 3], "b": "x"});
        let encoded = canonicalize(&v);
        let decoded: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, v);
    }
}
