//! Execution token minting, validation, and live resource accounting.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::error::{GovernorError, GovernorResult};

/// Default CPU allotment, in milliseconds, for a token whose request omits one.
pub const DEFAULT_CPU_MILLIS: u64 = 1000;
/// Default memory allotment, in bytes (256 MiB), for a token whose request omits one.
pub const DEFAULT_MEMORY_BYTES: u64 = 256 * 1024 * 1024;
/// Default per-task timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default priority, on a 1-10 scale.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Fleet-wide resource ceilings, fixed for the lifetime of the governor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Total CPU budget, in milliseconds, shared across active tokens.
    pub total_cpu_millis: u64,
    /// Total memory budget, in bytes, shared across active tokens.
    pub total_memory_bytes: u64,
    /// Maximum number of tasks the build queue may run concurrently.
    pub max_concurrent: usize,
    /// Maximum number of tasks the build queue may hold queued.
    pub max_queue_depth: usize,
}

/// Live resource usage summed across currently active tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Summed CPU allotment, in milliseconds, of every active token.
    pub cpu_millis: u64,
    /// Summed memory allotment, in bytes, of every active token.
    pub memory_bytes: u64,
}

/// A request to mint a new token. Omitted fields fall back to the defaults
/// documented on the corresponding `DEFAULT_*` constant; `priority` is
/// clamped to `[1, 10]`.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    /// The requesting owner (typically a plugin id).
    pub owner: String,
    /// Requested CPU allotment in milliseconds.
    pub cpu_millis: Option<u64>,
    /// Requested memory allotment in bytes.
    pub memory_bytes: Option<u64>,
    /// Requested per-task timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Requested priority, clamped to `[1, 10]`.
    pub priority: Option<u8>,
    /// Time-to-live in milliseconds; sets `expires_at` when present.
    pub ttl_ms: Option<u64>,
}

impl TokenRequest {
    /// Builds a request for `owner` with every other field defaulted.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Self::default()
        }
    }

    fn resolved_cpu(&self) -> u64 {
        self.cpu_millis.unwrap_or(DEFAULT_CPU_MILLIS)
    }

    fn resolved_memory(&self) -> u64 {
        self.memory_bytes.unwrap_or(DEFAULT_MEMORY_BYTES)
    }

    fn resolved_priority(&self) -> u8 {
        self.priority.unwrap_or(DEFAULT_PRIORITY).clamp(1, 10)
    }

    /// Halves `cpu_millis` and `memory_bytes` (integer floor), as applied
    /// when the policy engine returns `throttle`.
    pub fn halved(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            cpu_millis: Some(self.resolved_cpu() / 2),
            memory_bytes: Some(self.resolved_memory() / 2),
            timeout_ms: self.timeout_ms,
            priority: self.priority,
            ttl_ms: self.ttl_ms,
        }
    }
}

struct TokenRecord {
    id: String,
    owner: String,
    cpu_millis: u64,
    memory_bytes: u64,
    timeout_ms: u64,
    priority: u8,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked: bool,
    consumed: bool,
}

impl TokenRecord {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.consumed && self.expires_at.is_none_or(|exp| exp > now)
    }

    fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            id: self.id.clone(),
            owner: self.owner.clone(),
            cpu_millis: self.cpu_millis,
            memory_bytes: self.memory_bytes,
            timeout_ms: self.timeout_ms,
            priority: self.priority,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            revoked: self.revoked,
            consumed: self.consumed,
        }
    }
}

/// A read-only, value-typed view of a token at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Unique token id.
    pub id: String,
    /// The owner this token was minted for.
    pub owner: String,
    /// CPU allotment in milliseconds.
    pub cpu_millis: u64,
    /// Memory allotment in bytes.
    pub memory_bytes: u64,
    /// Per-task timeout in milliseconds.
    pub timeout_ms: u64,
    /// Priority on a 1-10 scale.
    pub priority: u8,
    /// When the token was minted.
    pub issued_at: DateTime<Utc>,
    /// When the token expires, if it carries a TTL.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the token has been explicitly revoked.
    pub revoked: bool,
    /// Whether the token has been consumed by a completed task.
    pub consumed: bool,
}

/// Mints, revokes, consumes, and validates execution tokens, and computes
/// live resource usage across the active set.
///
/// Token records are mutated only behind the issuer's own lock; callers see
/// only immutable [`TokenSnapshot`] values.
pub struct TokenIssuer {
    limits: ResourceLimits,
    tokens: RwLock<HashMap<String, TokenRecord>>,
    audit: Arc<AuditLog>,
}

impl TokenIssuer {
    /// Creates a new issuer bound to `limits`, auditing every operation to `audit`.
    pub fn new(limits: ResourceLimits, audit: Arc<AuditLog>) -> Self {
        Self {
            limits,
            tokens: RwLock::new(HashMap::new()),
            audit,
        }
    }

    /// Returns the fleet resource limits this issuer enforces.
    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Sums `(cpu, memory)` over every currently active token.
    pub fn usage(&self) -> ResourceUsage {
        let now = Utc::now();
        let tokens = self.tokens.read();
        tokens.values().filter(|t| t.is_active(now)).fold(
            ResourceUsage::default(),
            |mut usage, t| {
                usage.cpu_millis += t.cpu_millis;
                usage.memory_bytes += t.memory_bytes;
                usage
            },
        )
    }

    /// Mints a token for `request` if doing so would not exceed fleet
    /// limits. On budget overrun, fails naming the remaining headroom.
    pub fn issue(&self, request: &TokenRequest) -> GovernorResult<TokenSnapshot> {
        let cpu = request.resolved_cpu();
        let memory = request.resolved_memory();

        let mut tokens = self.tokens.write();
        let now = Utc::now();
        let usage = tokens.values().filter(|t| t.is_active(now)).fold(
            ResourceUsage::default(),
            |mut usage, t| {
                usage.cpu_millis += t.cpu_millis;
                usage.memory_bytes += t.memory_bytes;
                usage
            },
        );

        if usage.cpu_millis + cpu > self.limits.total_cpu_millis
            || usage.memory_bytes + memory > self.limits.total_memory_bytes
        {
            return Err(GovernorError::BudgetExceeded {
                remaining_cpu: self.limits.total_cpu_millis.saturating_sub(usage.cpu_millis),
                remaining_mem: self.limits.total_memory_bytes.saturating_sub(usage.memory_bytes),
            });
        }

        let id = Uuid::new_v4().to_string();
        let record = TokenRecord {
            id: id.clone(),
            owner: request.owner.clone(),
            cpu_millis: cpu,
            memory_bytes: memory,
            timeout_ms: request.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            priority: request.resolved_priority(),
            issued_at: now,
            expires_at: request.ttl_ms.map(|ttl| now + chrono::Duration::milliseconds(ttl as i64)),
            revoked: false,
            consumed: false,
        };
        let snapshot = record.snapshot();
        tokens.insert(id.clone(), record);
        drop(tokens);

        self.audit.record(
            "token.issued",
            &request.owner,
            &id,
            serde_json::json!({ "cpuMillis": cpu, "memoryBytes": memory }),
        );

        Ok(snapshot)
    }

    /// Revokes a token by id. Returns `false` if the token is unknown.
    pub fn revoke(&self, token_id: &str) -> bool {
        let mut tokens = self.tokens.write();
        let Some(record) = tokens.get_mut(token_id) else {
            return false;
        };
        record.revoked = true;
        drop(tokens);
        self.audit.record("token.revoked", "governor", token_id, serde_json::json!({}));
        true
    }

    /// Marks a token consumed, as happens when its bound task completes.
    /// Returns `false` if the token is unknown.
    pub fn consume(&self, token_id: &str) -> bool {
        let mut tokens = self.tokens.write();
        let Some(record) = tokens.get_mut(token_id) else {
            return false;
        };
        record.consumed = true;
        drop(tokens);
        self.audit.record("token.consumed", "governor", token_id, serde_json::json!({}));
        true
    }

    /// Validates a token, auto-revoking it (and auditing `token.expired`) if
    /// it has observably expired. Returns whether it is currently active.
    pub fn validate(&self, token_id: &str) -> bool {
        let now = Utc::now();
        let mut tokens = self.tokens.write();
        let Some(record) = tokens.get_mut(token_id) else {
            return false;
        };

        if !record.revoked && !record.consumed {
            if let Some(expires_at) = record.expires_at {
                if expires_at <= now {
                    record.revoked = true;
                    drop(tokens);
                    self.audit.record("token.expired", "governor", token_id, serde_json::json!({}));
                    return false;
                }
            }
        }

        record.is_active(now)
    }

    /// Returns a snapshot of the token, if known.
    pub fn get(&self, token_id: &str) -> Option<TokenSnapshot> {
        self.tokens.read().get(token_id).map(TokenRecord::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ResourceLimits {
        ResourceLimits {
            total_cpu_millis: 4000,
            total_memory_bytes: 1024 * 1024 * 1024,
            max_concurrent: 4,
            max_queue_depth: 16,
        }
    }

    #[test]
    fn usage_sums_only_active_tokens() {
        let issuer = TokenIssuer::new(limits(), Arc::new(AuditLog::new()));
        let mut request = TokenRequest::new("plugin-a");
        request.cpu_millis = Some(1500);
        request.memory_bytes = Some(0);

        let tok1 = issuer.issue(&request).unwrap();
        issuer.issue(&request).unwrap();

        let usage = issuer.usage();
        assert_eq!(usage.cpu_millis, 3000);

        issuer.revoke(&tok1.id);
        assert_eq!(issuer.usage().cpu_millis, 1500);
    }

    #[test]
    fn issuance_over_budget_fails_with_remaining_headroom() {
        let issuer = TokenIssuer::new(limits(), Arc::new(AuditLog::new()));
        let mut request = TokenRequest::new("plugin-a");
        request.cpu_millis = Some(3900);
        request.memory_bytes = Some(0);
        issuer.issue(&request).unwrap();

        let mut over = TokenRequest::new("plugin-a");
        over.cpu_millis = Some(200);
        over.memory_bytes = Some(0);
        let err = issuer.issue(&over).unwrap_err();
        match err {
            GovernorError::BudgetExceeded { remaining_cpu, .. } => assert_eq!(remaining_cpu, 100),
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn priority_is_clamped_to_one_through_ten() {
        let issuer = TokenIssuer::new(limits(), Arc::new(AuditLog::new()));
        let mut request = TokenRequest::new("plugin-a");
        request.priority = Some(99);
        let token = issuer.issue(&request).unwrap();
        assert_eq!(token.priority, 10);
    }

    #[test]
    fn validate_auto_revokes_expired_tokens() {
        let issuer = TokenIssuer::new(limits(), Arc::new(AuditLog::new()));
        let mut request = TokenRequest::new("plugin-a");
        request.ttl_ms = Some(0);
        let token = issuer.issue(&request).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(!issuer.validate(&token.id));

        let entries = issuer.audit.entries();
        assert!(entries.iter().any(|e| e.action == "token.expired"));
    }
}
