//! Detail snapshot change detection.

use std::collections::HashSet;

use serde_json::{Map, Value};

use hrsync_tasks::canonicalize;

/// Result of comparing a stored snapshot to an imported record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotComparison {
    Unchanged,
    Changed,
    /// Stored snapshot is not a JSON object. Treated as changed.
    Unreadable,
}

impl SnapshotComparison {
    #[must_use]
    pub fn needs_update(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Compares snapshots with a fixed set of top-level keys excluded.
#[derive(Debug, Clone)]
pub struct SnapshotComparer {
    excluded: HashSet<String>,
}

impl SnapshotComparer {
    #[must_use]
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    fn strip(&self, record: &Map<String, Value>) -> Map<String, Value> {
        record
            .iter()
            .filter(|(k, _)| !self.excluded.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Compare the stored text against an imported record.
    #[must_use]
    pub fn compare(&self, stored: &str, imported: &Map<String, Value>) -> SnapshotComparison {
        match serde_json::from_str::<Value>(stored) {
            Ok(Value::Object(stored)) => {
                if self.strip(&stored) == self.strip(imported) {
                    SnapshotComparison::Unchanged
                } else {
                    SnapshotComparison::Changed
                }
            }
            _ => SnapshotComparison::Unreadable,
        }
    }
}

/// Text stored as a detail snapshot: canonical JSON of the whole record.
#[must_use]
pub fn snapshot_text(record: &Value) -> String {
    canonicalize(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn comparer() -> SnapshotComparer {
        SnapshotComparer::new(["instNr", "assignments"])
    }

    #[test]
    fn test_excluded_keys_are_ignored() {
        let stored = snapshot_text(&json!({
            "personId": "U1", "naam": "Peeters", "instNr": "001", "assignments": [1]
        }));
        let imported = object(json!({
            "naam": "Peeters", "personId": "U1", "instNr": "002", "assignments": []
        }));
        assert_eq!(comparer().compare(&stored, &imported), SnapshotComparison::Unchanged);
    }

    #[test]
    fn test_changed_field_is_detected() {
        let stored = snapshot_text(&json!({"personId": "U1", "naam": "Peeters"}));
        let imported = object(json!({"personId": "U1", "naam": "Janssens"}));
        assert_eq!(comparer().compare(&stored, &imported), SnapshotComparison::Changed);

        let added = object(json!({"personId": "U1", "naam": "Peeters", "email": "x@y"}));
        assert!(comparer().compare(&stored, &added).needs_update());
    }

    #[test]
    fn test_corrupt_snapshot_fails_safe() {
        let imported = object(json!({"personId": "U1"}));
        assert_eq!(comparer().compare("{not json", &imported), SnapshotComparison::Unreadable);
        assert_eq!(comparer().compare("[1,2]", &imported), SnapshotComparison::Unreadable);
        assert!(SnapshotComparison::Unreadable.needs_update());
    }
}
