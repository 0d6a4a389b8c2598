//! Open-task dedup keys.
//!
//! Deterministic SHA-256 keys over a task's dispatch name, the identity of
//! the record it acts on and its canonicalized hint. Two requests with the
//! same key describe the same pending work.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::TaskTriple;

/// Generate the dedup key for a task request.
///
/// When `identity` is absent the canonical `data` payload stands in for it.
#[must_use]
pub fn dedup_key(
    triple: &TaskTriple,
    identity: Option<&str>,
    data: &Value,
    data2: Option<&Value>,
) -> String {
    let subject = match identity {
        Some(identity) => identity.to_string(),
        None => hash_string(&canonicalize(data)),
    };
    let hint = data2.map(canonicalize).unwrap_or_default();
    let composite = format!(
        "{}:{}:{}",
        triple.dispatch_name(),
        subject,
        hash_string(&hint)
    );
    hash_string(&composite)
}

/// Serialize with recursively sorted object keys and no whitespace.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    sort_json_keys(value).to_string()
}

fn sort_json_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_json_keys(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_json_keys).collect()),
        other => other.clone(),
    }
}

fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TaskAction, TaskObject, TaskTarget};
    use serde_json::json;

    fn upd() -> TaskTriple {
        TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Upd)
    }

    #[test]
    fn test_key_is_64_hex_chars() {
        let key = dedup_key(&upd(), Some("U1"), &json!({}), None);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_key_ignores_payload() {
        let a = dedup_key(&upd(), Some("U1@001"), &json!({"a": 1}), None);
        let b = dedup_key(&upd(), Some("U1@001"), &json!({"a": 2}), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hint_distinguishes_keys() {
        let reactivate = json!({"action": "REACTIVATE"});
        let update = json!({"action": "UPDATE"});
        let a = dedup_key(&upd(), Some("U1"), &json!({}), Some(&reactivate));
        let b = dedup_key(&upd(), Some("U1"), &json!({}), Some(&update));
        assert_ne!(a, b);
    }

    #[test]
    fn test_payload_key_is_order_independent() {
        let a = dedup_key(&upd(), None, &json!({"x": 1, "y": {"b": 2, "a": 1}}), None);
        let b = dedup_key(&upd(), None, &json!({"y": {"a": 1, "b": 2}, "x": 1}), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_triple_distinguishes_keys() {
        let deact = TaskTriple::new(TaskTarget::Db, TaskObject::Employee, TaskAction::Deact);
        assert_ne!(
            dedup_key(&upd(), Some("U1"), &json!({}), None),
            dedup_key(&deact, Some("U1"), &json!({}), None)
        );
    }
}
