//! Event envelopes for the Warden event bus.
//!
//! This module provides the core event infrastructure:
//!
//! - [`EventPayload`] — trait implemented for any serializable, type-erased
//!   payload, supporting runtime downcasting.
//! - [`Event`] — the immutable envelope assigned a topic, source, sequence
//!   number, and timestamp by the bus at publish time.
//! - [`TopicPattern`] — exact / prefix-wildcard / catch-all subscription
//!   matching.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A type-erased, downcastable event payload.
///
/// Implemented automatically for any type that is `Serialize + Debug + Send
/// + Sync + 'static`, mirroring the dynamic-payload design note in the
/// specification: payloads are schemaless at the bus level but recoverable
/// via `downcast` for plugins that know the concrete type.
pub trait EventPayload: Any + Send + Sync + fmt::Debug {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Serializes the payload to a JSON value for introspection and
    /// cross-plugin consumers that don't know the concrete type.
    fn to_json(&self) -> serde_json::Value;
}

impl<T> EventPayload for T
where
    T: Serialize + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// An immutable, ordered event envelope.
///
/// Envelopes are constructed only by [`EventBus::publish`](crate::foundation::bus::EventBus::publish),
/// which assigns the `sequence` and `timestamp`. Cloning an `Event` is cheap —
/// the payload is reference-counted.
#[derive(Clone)]
pub struct Event {
    /// Dot-delimited lowercase topic, e.g. `"governor.task.queued"`.
    pub topic: String,
    /// The plugin id that published this event.
    pub source: String,
    /// Monotonic sequence number, strictly increasing within a bus lifetime
    /// (reset by [`EventBus::reset`](crate::foundation::bus::EventBus::reset)).
    pub sequence: u64,
    /// ISO-8601 publish timestamp.
    pub timestamp: DateTime<Utc>,
    payload: Arc<dyn EventPayload>,
}

impl Event {
    pub(crate) fn new(
        topic: String,
        source: String,
        sequence: u64,
        timestamp: DateTime<Utc>,
        payload: Arc<dyn EventPayload>,
    ) -> Self {
        Self {
            topic,
            source,
            sequence,
            timestamp,
            payload,
        }
    }

    /// Attempts to downcast the payload to a concrete type.
    pub fn downcast<T: EventPayload>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref()
    }

    /// Returns the payload re-encoded as JSON, for consumers that only need
    /// structural access.
    pub fn payload_json(&self) -> serde_json::Value {
        self.payload.to_json()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("topic", &self.topic)
            .field("source", &self.source)
            .field("sequence", &self.sequence)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// A subscription topic pattern.
///
/// - `TopicPattern::Exact` matches only the identical topic string.
/// - `TopicPattern::Prefix` (written `"a.*"`) matches any topic whose first
///   dot-segment-prefix is `a`, excluding the literal topic `a` itself.
/// - `TopicPattern::Wildcard` (written `"*"`) matches every topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// Matches exactly this topic string.
    Exact(String),
    /// Matches any topic with this dot-segment prefix, e.g. `"health"` for `"health.*"`.
    Prefix(String),
    /// Matches every topic.
    Wildcard,
}

impl TopicPattern {
    /// Parses a pattern string into a [`TopicPattern`].
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            TopicPattern::Wildcard
        } else if let Some(prefix) = pattern.strip_suffix(".*") {
            TopicPattern::Prefix(prefix.to_string())
        } else {
            TopicPattern::Exact(pattern.to_string())
        }
    }

    /// Returns whether this pattern matches the given topic.
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Exact(exact) => exact == topic,
            TopicPattern::Prefix(prefix) => {
                topic != prefix.as_str()
                    && topic
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
            TopicPattern::Wildcard => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_matches_children_not_self() {
        let pattern = TopicPattern::parse("health.*");
        assert!(pattern.matches("health.check"));
        assert!(pattern.matches("health.check.deep"));
        assert!(!pattern.matches("health"));
        assert!(!pattern.matches("healthy.thing"));
    }

    #[test]
    fn wildcard_matches_everything() {
        let pattern = TopicPattern::parse("*");
        assert!(pattern.matches("anything.at.all"));
    }

    #[test]
    fn exact_pattern_matches_only_itself() {
        let pattern = TopicPattern::parse("core.boot.complete");
        assert!(pattern.matches("core.boot.complete"));
        assert!(!pattern.matches("core.boot.complete.extra"));
    }
}
