//! The amendment simulator: applies a pure effect against a cloned state,
//! enforcing that any declared prerequisite has already been activated.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{SandboxError, SandboxResult};

/// A pure state-mutating effect.
pub trait AmendmentEffect: Send + Sync {
    /// Mutates a clone of the current state. Must not have side effects
    /// beyond `state`.
    fn apply(&self, state: &mut HashMap<String, Value>);
}

/// A proposed change: an effect plus the bookkeeping needed to enforce
/// prerequisite ordering.
pub struct Amendment {
    /// Unique amendment id.
    pub id: String,
    /// A human-readable label.
    pub label: String,
    /// The id of an amendment that must be active before this one may simulate.
    pub prerequisite: Option<String>,
    /// The effect this amendment applies.
    pub effect: std::sync::Arc<dyn AmendmentEffect>,
}

/// Tracks which amendments have been activated and simulates proposed
/// amendments against a cloned state without mutating the original.
#[derive(Default)]
pub struct AmendmentSimulator {
    active: RwLock<HashSet<String>>,
}

impl AmendmentSimulator {
    /// Creates a simulator with no amendments yet activated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `amendment`'s effect to a clone of `state`, returning the
    /// resulting state without touching the original. Fails if the
    /// amendment declares a prerequisite that has not been activated.
    pub fn simulate(
        &self,
        amendment: &Amendment,
        state: &HashMap<String, Value>,
    ) -> SandboxResult<HashMap<String, Value>> {
        if let Some(prerequisite) = &amendment.prerequisite {
            if !self.active.read().contains(prerequisite) {
                return Err(SandboxError::PrerequisiteNotActive(prerequisite.clone()));
            }
        }

        let mut cloned = state.clone();
        amendment.effect.apply(&mut cloned);
        Ok(cloned)
    }

    /// Marks `amendment_id` as active, satisfying it as a prerequisite for
    /// later amendments.
    pub fn activate(&self, amendment_id: impl Into<String>) {
        self.active.write().insert(amendment_id.into());
    }

    /// Returns whether `amendment_id` has been activated.
    pub fn is_active(&self, amendment_id: &str) -> bool {
        self.active.read().contains(amendment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct SetKey {
        key: String,
        value: Value,
    }

    impl AmendmentEffect for SetKey {
        fn apply(&self, state: &mut HashMap<String, Value>) {
            state.insert(self.key.clone(), self.value.clone());
        }
    }

    #[test]
    fn simulate_does_not_mutate_original_state() {
        let simulator = AmendmentSimulator::new();
        let state = HashMap::new();
        let amendment = Amendment {
            id: "a1".to_string(),
            label: "set a".to_string(),
            prerequisite: None,
            effect: Arc::new(SetKey {
                key: "a".to_string(),
                value: Value::from(1),
            }),
        };

        let result = simulator.simulate(&amendment, &state).unwrap();
        assert_eq!(result.get("a"), Some(&Value::from(1)));
        assert!(state.is_empty());
    }

    #[test]
    fn unmet_prerequisite_is_rejected() {
        let simulator = AmendmentSimulator::new();
        let amendment = Amendment {
            id: "a2".to_string(),
            label: "depends on a1".to_string(),
            prerequisite: Some("a1".to_string()),
            effect: Arc::new(SetKey {
                key: "b".to_string(),
                value: Value::from(2),
            }),
        };

        let err = simulator.simulate(&amendment, &HashMap::new()).unwrap_err();
        assert!(matches!(err, SandboxError::PrerequisiteNotActive(_)));

        simulator.activate("a1");
        assert!(simulator.simulate(&amendment, &HashMap::new()).is_ok());
    }
}
