//! Canonical JSON serialization and content-addressed cache keys.
//!
//! Mirrors the workspace's null-byte-separated composite-key convention
//! (`agent_name` + canonicalized input), hashed with SHA-256 rather than
//! joined as a plain string, since the input can be arbitrarily large.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Recursively rebuild a JSON value with object keys in sorted order.
///
/// Arrays keep element order — only object key order is normalized.
/// Scalars and array elements serialize via their standard JSON form.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Produce a canonical string form of `value`: object keys sorted
/// recursively, then serialized with `serde_json`'s standard compact form.
///
/// Timestamps embedded in `value` must already be normalized to a single
/// stable string representation (e.g. RFC 3339) before being canonicalized —
/// this function only fixes key order, it does not reformat scalars.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).expect("canonicalized JSON always serializes")
}

/// Derive the content-addressed cache key for `(agent_name, input)`.
///
/// `canonical_json(x) == canonical_json(y) iff cache_key(agent, x) == cache_key(agent, y)`
/// for a fixed `agent_name`, since SHA-256 is collision-resistant and the
/// null byte cannot appear inside a canonical JSON string.
pub fn cache_key(agent_name: &str, input: &Value) -> String {
    let canonical = canonical_json(input);
    let mut hasher = Sha256::new();
    hasher.update(agent_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
