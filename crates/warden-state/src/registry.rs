//! The append-only, globally versioned state registry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single `set` or `delete` transition appended to the registry's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// The key that changed.
    pub key: String,
    /// The value before this transition, `None` if the key was previously absent.
    pub previous: Option<Value>,
    /// The value after this transition, `None` if this transition was a delete.
    pub new: Option<Value>,
    /// The registry version this transition produced.
    pub version: u64,
    /// The plugin id that performed the mutation.
    pub updated_by: String,
    /// When this transition was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A point-in-time, serializable copy of the registry's map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The full key → value map at the time of the snapshot.
    pub entries: HashMap<String, Value>,
    /// The registry's version at the time of the snapshot.
    pub version: u64,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

struct RegistryState {
    entries: HashMap<String, Value>,
    version: u64,
    transitions: Vec<Transition>,
}

/// An append-only log of key → value transitions over a globally versioned
/// map. Every `set` or `delete` increments the version and appends a
/// [`Transition`] record; nothing is ever mutated in place.
#[derive(Default)]
pub struct StateRegistry {
    state: RwLock<RegistryState>,
}

impl StateRegistry {
    /// Creates a new, empty registry at version 0.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                entries: HashMap::new(),
                version: 0,
                transitions: Vec::new(),
            }),
        }
    }

    /// Sets `key` to `value`, incrementing the version and appending a
    /// transition attributed to `updated_by`. Returns the new version.
    pub fn set(&self, key: impl Into<String>, value: Value, updated_by: impl Into<String>) -> u64 {
        let key = key.into();
        let mut state = self.state.write();
        let previous = state.entries.get(&key).cloned();
        state.version += 1;
        let version = state.version;
        state.entries.insert(key.clone(), value.clone());
        state.transitions.push(Transition {
            key,
            previous,
            new: Some(value),
            version,
            updated_by: updated_by.into(),
            timestamp: Utc::now(),
        });
        version
    }

    /// Deletes `key`, incrementing the version and appending a transition
    /// whose `new` value is `None`, even if `key` was already absent.
    pub fn delete(&self, key: impl Into<String>, updated_by: impl Into<String>) -> u64 {
        let key = key.into();
        let mut state = self.state.write();
        let previous = state.entries.remove(&key);
        state.version += 1;
        let version = state.version;
        state.transitions.push(Transition {
            key,
            previous,
            new: None,
            version,
            updated_by: updated_by.into(),
            timestamp: Utc::now(),
        });
        version
    }

    /// Returns the value currently stored for `key`, if present.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().entries.get(key).cloned()
    }

    /// Returns every key currently present in the map.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// Returns the current version.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Returns every transition recorded so far, in order.
    pub fn transitions(&self) -> Vec<Transition> {
        self.state.read().transitions.clone()
    }

    /// Takes a serializable snapshot of the current map and version.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            entries: state.entries.clone(),
            version: state.version,
            timestamp: Utc::now(),
        }
    }

    /// Atomically replaces the current map and version with `snapshot`'s.
    /// The transition log is left intact and this call is not itself logged.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut state = self.state.write();
        state.entries = snapshot.entries;
        state.version = snapshot.version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_increments_version_and_records_transition() {
        let registry = StateRegistry::new();
        let v1 = registry.set("a", Value::from(1), "plugin-a");
        assert_eq!(v1, 1);
        let v2 = registry.set("a", Value::from(2), "plugin-a");
        assert_eq!(v2, 2);

        let transitions = registry.transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[1].previous, Some(Value::from(1)));
        assert_eq!(transitions[1].new, Some(Value::from(2)));
    }

    #[test]
    fn delete_records_transition_with_no_new_value() {
        let registry = StateRegistry::new();
        registry.set("a", Value::from(1), "plugin-a");
        registry.delete("a", "plugin-a");

        assert_eq!(registry.get("a"), None);
        let transitions = registry.transitions();
        assert_eq!(transitions.last().unwrap().new, None);
        assert_eq!(transitions.last().unwrap().previous, Some(Value::from(1)));
    }

    #[test]
    fn restore_matches_snapshot_version_and_keys() {
        let registry = StateRegistry::new();
        registry.set("a", Value::from(1), "plugin-a");
        registry.set("b", Value::from(2), "plugin-a");
        let snapshot = registry.snapshot();

        registry.set("c", Value::from(3), "plugin-a");
        registry.delete("a", "plugin-a");

        registry.restore(snapshot.clone());

        assert_eq!(registry.version(), snapshot.version);
        let mut keys = registry.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
