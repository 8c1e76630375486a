//! The replay engine: sorts recorded events by sequence and applies
//! matching pure handlers to a cloned state, producing per-step diffs.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use warden_core::TopicPattern;

use crate::snapshot::SandboxEvent;

/// A single key's change across one replay step.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDiffEntry {
    /// The key that changed.
    pub key: String,
    /// The value before this step, if it was present.
    pub previous: Option<Value>,
    /// The value after this step, if it is present.
    pub new: Option<Value>,
}

/// One event applied during replay, with the state immediately before and
/// after, and the resulting diff.
#[derive(Debug, Clone)]
pub struct ReplayStep {
    /// The event applied at this step.
    pub event: SandboxEvent,
    /// State immediately before this step.
    pub state_before: HashMap<String, Value>,
    /// State immediately after this step.
    pub state_after: HashMap<String, Value>,
    /// The keys that changed as a result of this step.
    pub diff: Vec<StateDiffEntry>,
}

/// Bounds limiting how much of a replay runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayBounds {
    /// Stop after applying this many events.
    pub max_events: Option<usize>,
    /// Stop before applying any event whose sequence exceeds this value.
    pub stop_at_sequence: Option<u64>,
}

/// A pure state-mutating handler invoked for events matching its topic pattern.
pub trait ReplayHandler: Send + Sync {
    /// The topic pattern this handler matches against (exact, `prefix.*`, or `*`).
    fn topic_pattern(&self) -> &str;

    /// Mutates `state` in response to `event`. Must be pure with respect to
    /// anything outside `state` and `event`.
    fn apply(&self, state: &mut HashMap<String, Value>, event: &SandboxEvent);
}

fn diff(before: &HashMap<String, Value>, after: &HashMap<String, Value>) -> Vec<StateDiffEntry> {
    let mut keys: Vec<&String> = before.keys().chain(after.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let previous = before.get(key).cloned();
            let new = after.get(key).cloned();
            if previous == new {
                None
            } else {
                Some(StateDiffEntry {
                    key: key.clone(),
                    previous,
                    new,
                })
            }
        })
        .collect()
}

/// Sorts `events` by sequence, then applies every handler whose pattern
/// matches each event's topic, in handler registration order, respecting
/// `bounds`.
pub fn replay(
    events: &[SandboxEvent],
    initial_state: HashMap<String, Value>,
    handlers: &[Arc<dyn ReplayHandler>],
    bounds: ReplayBounds,
) -> Vec<ReplayStep> {
    let mut sorted: Vec<&SandboxEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.sequence);

    let patterns: Vec<(TopicPattern, &Arc<dyn ReplayHandler>)> = handlers
        .iter()
        .map(|h| (TopicPattern::parse(h.topic_pattern()), h))
        .collect();

    let mut state = initial_state;
    let mut steps = Vec::new();

    for event in sorted {
        if let Some(max) = bounds.max_events {
            if steps.len() >= max {
                break;
            }
        }
        if let Some(stop) = bounds.stop_at_sequence {
            if event.sequence > stop {
                break;
            }
        }

        let before = state.clone();
        for (pattern, handler) in &patterns {
            if pattern.matches(&event.topic) {
                handler.apply(&mut state, event);
            }
        }
        let after = state.clone();

        steps.push(ReplayStep {
            event: event.clone(),
            diff: diff(&before, &after),
            state_before: before,
            state_after: after,
        });
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SetFromPayload;

    impl ReplayHandler for SetFromPayload {
        fn topic_pattern(&self) -> &str {
            "state.*"
        }

        fn apply(&self, state: &mut HashMap<String, Value>, event: &SandboxEvent) {
            if let Some(key) = event.payload.get("key").and_then(|v| v.as_str()) {
                if let Some(value) = event.payload.get("value") {
                    state.insert(key.to_string(), value.clone());
                }
            }
        }
    }

    fn event(sequence: u64, topic: &str, key: &str, value: i64) -> SandboxEvent {
        SandboxEvent {
            topic: topic.to_string(),
            source: "test".to_string(),
            sequence,
            timestamp: chrono::Utc::now(),
            payload: serde_json::json!({ "key": key, "value": value }),
        }
    }

    #[test]
    fn events_are_applied_in_sequence_order_regardless_of_input_order() {
        let events = vec![event(2, "state.set", "b", 2), event(1, "state.set", "a", 1)];
        let handlers: Vec<Arc<dyn ReplayHandler>> = vec![Arc::new(SetFromPayload)];
        let steps = replay(&events, HashMap::new(), &handlers, ReplayBounds::default());

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].event.sequence, 1);
        assert_eq!(steps[1].event.sequence, 2);
        assert_eq!(steps[1].state_after.get("a"), Some(&Value::from(1)));
        assert_eq!(steps[1].state_after.get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn max_events_bound_stops_early() {
        let events = vec![event(1, "state.set", "a", 1), event(2, "state.set", "b", 2)];
        let handlers: Vec<Arc<dyn ReplayHandler>> = vec![Arc::new(SetFromPayload)];
        let steps = replay(
            &events,
            HashMap::new(),
            &handlers,
            ReplayBounds {
                max_events: Some(1),
                stop_at_sequence: None,
            },
        );
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn diff_reports_only_changed_keys() {
        let events = vec![event(1, "state.set", "a", 1)];
        let handlers: Vec<Arc<dyn ReplayHandler>> = vec![Arc::new(SetFromPayload)];
        let steps = replay(&events, HashMap::new(), &handlers, ReplayBounds::default());

        assert_eq!(steps[0].diff.len(), 1);
        assert_eq!(steps[0].diff[0].key, "a");
        assert_eq!(steps[0].diff[0].previous, None);
        assert_eq!(steps[0].diff[0].new, Some(Value::from(1)));
    }
}
