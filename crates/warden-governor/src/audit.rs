//! The governor's append-only audit log.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single recorded governor action: a token issuance or revocation, a
/// policy evaluation, a throttle application, or a task transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic entry id.
    pub id: u64,
    /// A short tag naming the kind of action, e.g. `"token.issued"`.
    pub action: String,
    /// The actor responsible (a plugin id, or `"governor"` for internal actions).
    pub actor: String,
    /// The id of the entity this entry concerns (a token id, task id, or rule id).
    pub entity_id: String,
    /// Arbitrary structured detail for this entry.
    pub details: Value,
    /// When this entry was recorded.
    pub timestamp: DateTime<Utc>,
}

/// An append-only log of every governor action.
#[derive(Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    next_id: RwLock<u64>,
}

impl AuditLog {
    /// Creates a new, empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new entry and returns its id.
    pub fn record(
        &self,
        action: impl Into<String>,
        actor: impl Into<String>,
        entity_id: impl Into<String>,
        details: Value,
    ) -> u64 {
        let mut next_id = self.next_id.write();
        let id = *next_id;
        *next_id += 1;
        self.entries.write().push(AuditEntry {
            id,
            action: action.into(),
            actor: actor.into(),
            entity_id: entity_id.into(),
            details,
            timestamp: Utc::now(),
        });
        id
    }

    /// Returns a snapshot copy of every entry, in recorded order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_preserve_insertion_order_with_increasing_ids() {
        let log = AuditLog::new();
        log.record("token.issued", "governor", "tok-1", serde_json::json!({}));
        log.record("token.revoked", "governor", "tok-1", serde_json::json!({}));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[1].id, 1);
        assert_eq!(entries[0].action, "token.issued");
    }
}
