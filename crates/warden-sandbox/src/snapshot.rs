//! The sandbox snapshot serializer: a content-hashed, tamper-evident
//! encoding of `{state, events, amendments}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{SandboxError, SandboxResult};

/// A serializable projection of a bus [`Event`](warden_core::Event), with
/// its payload re-encoded as JSON so the snapshot itself stays plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxEvent {
    /// The event's topic.
    pub topic: String,
    /// The publishing plugin id.
    pub source: String,
    /// The event's bus sequence number.
    pub sequence: u64,
    /// The event's publish timestamp.
    pub timestamp: DateTime<Utc>,
    /// The event's payload, re-encoded as JSON.
    pub payload: Value,
}

impl From<&warden_core::Event> for SandboxEvent {
    fn from(event: &warden_core::Event) -> Self {
        Self {
            topic: event.topic.clone(),
            source: event.source.clone(),
            sequence: event.sequence,
            timestamp: event.timestamp,
            payload: event.payload_json(),
        }
    }
}

/// A recorded amendment: the effect itself is not serializable, so the
/// snapshot captures only the metadata needed to reconstruct the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendmentRecord {
    /// Unique amendment id.
    pub id: String,
    /// A human-readable label.
    pub label: String,
    /// The id of the amendment that must be active before this one applies.
    pub prerequisite: Option<String>,
    /// Whether this amendment has been activated.
    pub active: bool,
}

/// The full captured state of a sandbox: the registry's map, the events
/// observed, and every amendment recorded against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSnapshot {
    /// The state registry's key-value map at the time of capture. A
    /// `serde_json::Map` rather than a `HashMap` so the canonical encoding
    /// below actually gets the sorted-key guarantee it relies on.
    pub state: Map<String, Value>,
    /// Every bus event observed, in the order recorded.
    pub events: Vec<SandboxEvent>,
    /// Every amendment recorded against this sandbox.
    pub amendments: Vec<AmendmentRecord>,
}

/// A snapshot's canonical JSON encoding plus its content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedSnapshot {
    /// The canonical JSON encoding (object keys sorted, no extra whitespace).
    pub canonical_json: String,
    /// The hex-encoded SHA-256 digest of `canonical_json`'s bytes.
    pub content_hash: String,
}

fn content_hash(canonical_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serializes `snapshot` to its canonical JSON encoding and computes a
/// content hash over it. `serde_json::Value`'s default map representation
/// is key-sorted, so the encoding is already canonical without extra work.
pub fn serialize(snapshot: &SandboxSnapshot) -> SerializedSnapshot {
    let canonical_json = serde_json::to_string(snapshot).expect("SandboxSnapshot is always serializable");
    let hash = content_hash(&canonical_json);
    SerializedSnapshot {
        canonical_json,
        content_hash: hash,
    }
}

/// Deserializes a [`SerializedSnapshot`], rejecting it if the recomputed
/// content hash does not match the stored one.
pub fn deserialize(serialized: &SerializedSnapshot) -> SandboxResult<SandboxSnapshot> {
    let computed = content_hash(&serialized.canonical_json);
    if computed != serialized.content_hash {
        return Err(SandboxError::HashMismatch {
            expected: serialized.content_hash.clone(),
            computed,
        });
    }
    serde_json::from_str(&serialized.canonical_json).map_err(|e| SandboxError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SandboxSnapshot {
        let mut state = Map::new();
        state.insert("a".to_string(), Value::from(1));
        SandboxSnapshot {
            state,
            events: Vec::new(),
            amendments: Vec::new(),
        }
    }

    #[test]
    fn round_trip_is_identity() {
        let snapshot = sample();
        let serialized = serialize(&snapshot);
        let restored = deserialize(&serialized).unwrap();
        assert_eq!(restored.state, snapshot.state);
    }

    #[test]
    fn tampering_with_payload_breaks_deserialize() {
        let mut serialized = serialize(&sample());
        serialized.canonical_json.push(' ');
        let err = deserialize(&serialized).unwrap_err();
        assert!(matches!(err, SandboxError::HashMismatch { .. }));
    }

    #[test]
    fn tampering_with_hash_breaks_deserialize() {
        let mut serialized = serialize(&sample());
        serialized.content_hash = "0".repeat(64);
        let err = deserialize(&serialized).unwrap_err();
        assert!(matches!(err, SandboxError::HashMismatch { .. }));
    }
}
