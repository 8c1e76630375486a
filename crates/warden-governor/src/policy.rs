//! The policy engine: priority-ordered rules yielding allow/deny/throttle.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::error::{GovernorError, GovernorResult};
use crate::token::ResourceUsage;

/// A brief, audit-friendly sketch of the request a policy rule evaluated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyRequest {
    /// Requested priority.
    pub priority: u8,
    /// Requested CPU allotment in milliseconds.
    pub cpu_millis: u64,
    /// Requested memory allotment in bytes.
    pub memory_bytes: u64,
}

/// The live fleet state a policy rule evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    /// The incoming request.
    pub request: PolicyRequest,
    /// Current CPU utilization, in `[0, 1+]`.
    pub cpu_util: f64,
    /// Current memory utilization, in `[0, 1+]`.
    pub mem_util: f64,
    /// Current number of queued (not running) tasks.
    pub queued_tasks: usize,
}

impl PolicyContext {
    /// Builds a context from resource usage, fleet limits, and queue depth.
    pub fn new(
        request: PolicyRequest,
        usage: ResourceUsage,
        limits: &crate::token::ResourceLimits,
        queued_tasks: usize,
    ) -> Self {
        Self {
            request,
            cpu_util: usage.cpu_millis as f64 / limits.total_cpu_millis as f64,
            mem_util: usage.memory_bytes as f64 / limits.total_memory_bytes as f64,
            queued_tasks,
        }
    }
}

/// A policy rule's verdict on a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// The request may proceed unmodified.
    Allow,
    /// The request is rejected outright.
    Deny,
    /// The request may proceed with its resource ask reduced.
    Throttle,
}

/// The final outcome of evaluating every rule against a request.
#[derive(Debug, Clone)]
pub struct PolicyVerdict {
    /// The final decision.
    pub decision: PolicyDecision,
    /// The id of the rule that produced a non-allow decision, if any.
    pub deciding_rule: Option<String>,
}

/// A single governance rule, evaluated top-down by priority.
pub trait PolicyRule: Send + Sync {
    /// Unique rule id.
    fn id(&self) -> &str;

    /// Evaluation priority; rules are walked in descending priority order.
    fn priority(&self) -> i32;

    /// Evaluates this rule against the live fleet context.
    fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision;
}

/// Denies when CPU utilization meets or exceeds `theta`.
pub struct CpuThreshold {
    id: String,
    priority: i32,
    theta: f64,
}

impl CpuThreshold {
    /// Builds a `cpu-threshold` rule at the given evaluation priority.
    pub fn new(id: impl Into<String>, priority: i32, theta: f64) -> Self {
        Self {
            id: id.into(),
            priority,
            theta,
        }
    }
}

impl PolicyRule for CpuThreshold {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        if ctx.cpu_util >= self.theta {
            PolicyDecision::Deny
        } else {
            PolicyDecision::Allow
        }
    }
}

/// Denies when memory utilization meets or exceeds `theta`.
pub struct MemoryThreshold {
    id: String,
    priority: i32,
    theta: f64,
}

impl MemoryThreshold {
    /// Builds a `memory-threshold` rule at the given evaluation priority.
    pub fn new(id: impl Into<String>, priority: i32, theta: f64) -> Self {
        Self {
            id: id.into(),
            priority,
            theta,
        }
    }
}

impl PolicyRule for MemoryThreshold {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        if ctx.mem_util >= self.theta {
            PolicyDecision::Deny
        } else {
            PolicyDecision::Allow
        }
    }
}

/// Denies when the queue already holds `d` or more queued tasks.
pub struct QueueDepthRule {
    id: String,
    priority: i32,
    max_depth: usize,
}

impl QueueDepthRule {
    /// Builds a `queue-depth` rule at the given evaluation priority.
    pub fn new(id: impl Into<String>, priority: i32, max_depth: usize) -> Self {
        Self {
            id: id.into(),
            priority,
            max_depth,
        }
    }
}

impl PolicyRule for QueueDepthRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        if ctx.queued_tasks >= self.max_depth {
            PolicyDecision::Deny
        } else {
            PolicyDecision::Allow
        }
    }
}

/// Throttles low-priority requests when average fleet load is high.
pub struct PriorityThrottle {
    id: String,
    priority: i32,
    min_priority: u8,
    load_threshold: f64,
}

impl PriorityThrottle {
    /// Builds a `priority-throttle` rule at the given evaluation priority.
    pub fn new(id: impl Into<String>, priority: i32, min_priority: u8, load_threshold: f64) -> Self {
        Self {
            id: id.into(),
            priority,
            min_priority,
            load_threshold,
        }
    }
}

impl PolicyRule for PriorityThrottle {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, ctx: &PolicyContext) -> PolicyDecision {
        let average_load = (ctx.cpu_util + ctx.mem_util) / 2.0;
        if ctx.request.priority < self.min_priority && average_load >= self.load_threshold {
            PolicyDecision::Throttle
        } else {
            PolicyDecision::Allow
        }
    }
}

/// Rules kept sorted by priority descending; evaluation walks top-down and
/// the first non-allow verdict wins.
pub struct PolicyEngine {
    rules: RwLock<Vec<Arc<dyn PolicyRule>>>,
    audit: Arc<AuditLog>,
}

impl PolicyEngine {
    /// Creates an empty policy engine, auditing every evaluation to `audit`.
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            audit,
        }
    }

    /// Registers a rule, keeping the set sorted by priority descending.
    /// Rejects a duplicate id.
    pub fn register(&self, rule: Arc<dyn PolicyRule>) -> GovernorResult<()> {
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.id() == rule.id()) {
            return Err(GovernorError::DuplicateRuleId(rule.id().to_string()));
        }
        let insert_at = rules.partition_point(|r| r.priority() >= rule.priority());
        rules.insert(insert_at, rule);
        Ok(())
    }

    /// Evaluates every rule, top-down, against `ctx`, auditing the final
    /// verdict. The first non-allow verdict wins; an all-allow run yields
    /// `PolicyDecision::Allow` with no deciding rule.
    pub fn evaluate(&self, ctx: &PolicyContext) -> PolicyVerdict {
        let rules = self.rules.read();
        let mut verdict = PolicyVerdict {
            decision: PolicyDecision::Allow,
            deciding_rule: None,
        };

        for rule in rules.iter() {
            let decision = rule.evaluate(ctx);
            if decision != PolicyDecision::Allow {
                verdict = PolicyVerdict {
                    decision,
                    deciding_rule: Some(rule.id().to_string()),
                };
                break;
            }
        }
        drop(rules);

        self.audit.record(
            "policy.evaluated",
            "governor",
            verdict.deciding_rule.as_deref().unwrap_or("none"),
            serde_json::json!({
                "decision": format!("{:?}", verdict.decision),
                "decidingRule": verdict.deciding_rule,
                "request": ctx.request,
            }),
        );

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::ResourceLimits;

    fn ctx(priority: u8, cpu_util: f64, mem_util: f64) -> PolicyContext {
        PolicyContext {
            request: PolicyRequest {
                priority,
                cpu_millis: 400,
                memory_bytes: 64 * 1024 * 1024,
            },
            cpu_util,
            mem_util,
            queued_tasks: 0,
        }
    }

    #[test]
    fn first_non_allow_verdict_wins() {
        let engine = PolicyEngine::new(Arc::new(AuditLog::new()));
        engine
            .register(Arc::new(CpuThreshold::new("cpu-threshold", 10, 0.9)))
            .unwrap();
        engine
            .register(Arc::new(QueueDepthRule::new("queue-depth", 5, 3)))
            .unwrap();

        let verdict = engine.evaluate(&ctx(5, 0.95, 0.1));
        assert_eq!(verdict.decision, PolicyDecision::Deny);
        assert_eq!(verdict.deciding_rule.as_deref(), Some("cpu-threshold"));
    }

    #[test]
    fn all_allow_yields_allow_with_no_deciding_rule() {
        let engine = PolicyEngine::new(Arc::new(AuditLog::new()));
        engine
            .register(Arc::new(CpuThreshold::new("cpu-threshold", 10, 0.9)))
            .unwrap();

        let verdict = engine.evaluate(&ctx(5, 0.1, 0.1));
        assert_eq!(verdict.decision, PolicyDecision::Allow);
        assert!(verdict.deciding_rule.is_none());
    }

    #[test]
    fn duplicate_rule_id_is_rejected() {
        let engine = PolicyEngine::new(Arc::new(AuditLog::new()));
        engine
            .register(Arc::new(CpuThreshold::new("dup", 10, 0.9)))
            .unwrap();
        let err = engine.register(Arc::new(MemoryThreshold::new("dup", 1, 0.9)));
        assert!(matches!(err, Err(GovernorError::DuplicateRuleId(_))));
    }

    #[test]
    fn throttle_path_scenario() {
        // Limits {cpu: 4000, mem: 1GiB}; two 1500-cpu tokens issued already
        // (cpuUtil = 0.75), default 256MiB tokens (memUtil = 0.5).
        let limits = ResourceLimits {
            total_cpu_millis: 4000,
            total_memory_bytes: 1024 * 1024 * 1024,
            max_concurrent: 4,
            max_queue_depth: 16,
        };
        let usage = crate::token::ResourceUsage {
            cpu_millis: 3000,
            memory_bytes: 512 * 1024 * 1024,
        };
        let engine = PolicyEngine::new(Arc::new(AuditLog::new()));
        engine
            .register(Arc::new(PriorityThrottle::new("priority-throttle", 1, 7, 0.6)))
            .unwrap();

        let request = PolicyRequest {
            priority: 3,
            cpu_millis: 400,
            memory_bytes: 64 * 1024 * 1024,
        };
        let verdict = engine.evaluate(&PolicyContext::new(request, usage, &limits, 0));
        assert_eq!(verdict.decision, PolicyDecision::Throttle);
        assert_eq!(verdict.deciding_rule.as_deref(), Some("priority-throttle"));
    }
}
