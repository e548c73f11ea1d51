//! Update change sets
//!
//! Splits the difference between the prior observed body and the planned body
//! into independent calls, one per update group.

use crate::kind::UpdateGroup;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Group name for changed fields not covered by any update group
pub const UNGROUPED: &str = "attributes";

/// A single mutating call worth of changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Update group name (e.g. "resize")
    pub group: String,

    /// Changed fields with their planned values
    pub payload: Value,
}

impl Change {
    pub fn fields(&self) -> Vec<&str> {
        self.payload
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Ordered list of changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    /// Compute top-level field differences between two JSON objects
    ///
    /// Fields present in `planned` whose value differs from `prior` (or is
    /// missing there) are changes. Fields only present in `prior` are ignored;
    /// they are not under the planner's control. Groups keep their configured
    /// order, followed by the ungrouped fields.
    pub fn between(prior: &Value, planned: &Value, groups: &[UpdateGroup]) -> Self {
        let empty = Map::new();
        let prior = prior.as_object().unwrap_or(&empty);
        let Some(planned) = planned.as_object() else {
            return Self::default();
        };

        let mut changed: Map<String, Value> = planned
            .iter()
            .filter(|(k, v)| prior.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut changes = Vec::new();
        for group in groups {
            let mut payload = Map::new();
            for field in &group.fields {
                if let Some(value) = changed.remove(field) {
                    payload.insert(field.clone(), value);
                }
            }
            if !payload.is_empty() {
                changes.push(Change {
                    group: group.name.clone(),
                    payload: Value::Object(payload),
                });
            }
        }

        if !changed.is_empty() {
            changes.push(Change {
                group: UNGROUPED.to_string(),
                payload: Value::Object(changed),
            });
        }

        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changes.is_empty() {
            return write!(f, "no changes");
        }
        let parts: Vec<String> = self
            .changes
            .iter()
            .map(|c| format!("{} ({})", c.group, c.fields().join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}
