//! The governor's scheduling facade: the single entry point plugins use to
//! request tokens and submit/drain tasks.

use std::sync::Arc;

use serde_json::Value;
use warden_core::EventBus;

use crate::audit::AuditLog;
use crate::error::{GovernorError, GovernorResult};
use crate::policy::{PolicyContext, PolicyDecision, PolicyEngine, PolicyRequest};
use crate::queue::{BuildQueue, QueuedTask, SubmitRequest, TaskExecutor, TaskStatus};
use crate::token::{ResourceLimits, TokenIssuer, TokenRequest, TokenSnapshot};

/// Bundles the token issuer, policy engine, and build queue behind the
/// operations a plugin actually calls.
pub struct GovernorFacade {
    issuer: Arc<TokenIssuer>,
    policy: Arc<PolicyEngine>,
    queue: Arc<BuildQueue>,
    audit: Arc<AuditLog>,
    bus: EventBus,
}

impl GovernorFacade {
    /// Assembles a facade around fresh collaborators bound to `limits` and `bus`.
    pub fn new(limits: ResourceLimits, executor: Arc<dyn TaskExecutor>, bus: EventBus) -> Self {
        let audit = Arc::new(AuditLog::new());
        let issuer = Arc::new(TokenIssuer::new(limits, audit.clone()));
        let policy = Arc::new(PolicyEngine::new(audit.clone()));
        let queue = Arc::new(BuildQueue::new(
            limits.max_concurrent,
            limits.max_queue_depth,
            executor,
            issuer.clone(),
            audit.clone(),
        ));
        Self {
            issuer,
            policy,
            queue,
            audit,
            bus,
        }
    }

    /// The shared token issuer.
    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// The shared policy engine.
    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    /// The shared build queue.
    pub fn queue(&self) -> &Arc<BuildQueue> {
        &self.queue
    }

    /// The shared audit log.
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Evaluates policy for `request`, then issues a token accordingly:
    /// `deny` publishes `governor.token.denied` and returns without a token;
    /// `throttle` halves the request and issues the reduced amount;
    /// `allow` issues the request unmodified. Publishes `governor.token.issued`
    /// on success.
    pub async fn request_token(&self, request: TokenRequest) -> GovernorResult<TokenSnapshot> {
        let limits = self.issuer.limits();
        let usage = self.issuer.usage();
        let policy_request = PolicyRequest {
            priority: request.priority.unwrap_or(crate::token::DEFAULT_PRIORITY).clamp(1, 10),
            cpu_millis: request.cpu_millis.unwrap_or(crate::token::DEFAULT_CPU_MILLIS),
            memory_bytes: request.memory_bytes.unwrap_or(crate::token::DEFAULT_MEMORY_BYTES),
        };
        let ctx = PolicyContext::new(policy_request, usage, &limits, self.queue.queue_depth());
        let verdict = self.policy.evaluate(&ctx);

        match verdict.decision {
            PolicyDecision::Deny => {
                let deciding_rule = verdict.deciding_rule.unwrap_or_else(|| "none".to_string());
                self.bus
                    .publish(
                        "governor.token.denied",
                        "governor",
                        serde_json::json!({ "decidingRule": deciding_rule }),
                    )
                    .await;
                Err(GovernorError::Denied { deciding_rule })
            }
            PolicyDecision::Throttle => {
                let reduced = request.halved();
                let token = self.issuer.issue(&reduced)?;
                self.audit.record(
                    "throttle.applied",
                    "governor",
                    &token.id,
                    serde_json::json!({ "decidingRule": verdict.deciding_rule }),
                );
                self.bus
                    .publish(
                        "governor.token.issued",
                        "governor",
                        serde_json::json!({ "tokenId": token.id, "throttled": true }),
                    )
                    .await;
                Ok(token)
            }
            PolicyDecision::Allow => {
                let token = self.issuer.issue(&request)?;
                self.bus
                    .publish(
                        "governor.token.issued",
                        "governor",
                        serde_json::json!({ "tokenId": token.id, "throttled": false }),
                    )
                    .await;
                Ok(token)
            }
        }
    }

    /// Submits a task to the build queue and publishes `governor.task.queued`.
    pub async fn submit_task(&self, request: SubmitRequest) -> GovernorResult<String> {
        let id = self.queue.submit(request)?;
        self.bus
            .publish("governor.task.queued", "governor", serde_json::json!({ "taskId": id }))
            .await;
        Ok(id)
    }

    /// Drains the build queue, publishing one `governor.task.completed` or
    /// `governor.task.failed` event per finished task.
    pub async fn process_tasks(&self) -> Vec<QueuedTask> {
        let results = self.queue.drain().await;
        for task in &results {
            let topic = match task.status {
                TaskStatus::Completed => "governor.task.completed",
                TaskStatus::Failed => "governor.task.failed",
                _ => continue,
            };
            self.bus
                .publish(topic, "governor", serde_json::json!({ "taskId": task.id }))
                .await;
        }
        results
    }

    /// Returns the governor's live context as JSON, for invariant checks
    /// (`{cpuMillis, memoryBytes}` requested headroom, if supplied by the caller).
    pub fn invariant_context(&self) -> Value {
        let usage = self.issuer.usage();
        let limits = self.issuer.limits();
        serde_json::json!({
            "usage": { "cpuMillis": usage.cpu_millis, "memoryBytes": usage.memory_bytes },
            "limits": {
                "totalCpuMillis": limits.total_cpu_millis,
                "totalMemoryBytes": limits.total_memory_bytes,
                "maxQueueDepth": limits.max_queue_depth,
            },
            "queueDepth": self.queue.queue_depth(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysSucceeds;

    #[async_trait]
    impl TaskExecutor for AlwaysSucceeds {
        async fn execute(&self, _task: &QueuedTask) -> Result<Value, String> {
            Ok(serde_json::json!({}))
        }
    }

    fn facade() -> GovernorFacade {
        let limits = ResourceLimits {
            total_cpu_millis: 4000,
            total_memory_bytes: 1024 * 1024 * 1024,
            max_concurrent: 4,
            max_queue_depth: 16,
        };
        GovernorFacade::new(limits, Arc::new(AlwaysSucceeds), EventBus::new())
    }

    #[tokio::test]
    async fn throttle_path_end_to_end() {
        let facade = facade();

        let mut seed = TokenRequest::new("plugin-a");
        seed.cpu_millis = Some(1500);
        facade.request_token(seed.clone()).await.unwrap();
        facade.request_token(seed).await.unwrap();

        facade
            .policy
            .register(Arc::new(crate::policy::PriorityThrottle::new(
                "priority-throttle",
                1,
                7,
                0.6,
            )))
            .unwrap();

        let mut request = TokenRequest::new("plugin-b");
        request.priority = Some(3);
        request.cpu_millis = Some(400);
        request.memory_bytes = Some(64 * 1024 * 1024);

        let token = facade.request_token(request).await.unwrap();
        assert_eq!(token.cpu_millis, 200);
        assert_eq!(token.memory_bytes, 32 * 1024 * 1024);
    }

    #[tokio::test]
    async fn deny_publishes_denial_and_issues_no_token() {
        let facade = facade();
        facade
            .policy
            .register(Arc::new(crate::policy::CpuThreshold::new("cpu-threshold", 10, 0.0)))
            .unwrap();

        let err = facade.request_token(TokenRequest::new("plugin-a")).await.unwrap_err();
        assert!(matches!(err, GovernorError::Denied { .. }));
    }

    #[tokio::test]
    async fn submit_and_process_round_trip() {
        let facade = facade();
        let token = facade.request_token(TokenRequest::new("plugin-a")).await.unwrap();
        facade
            .submit_task(SubmitRequest {
                label: "build".to_string(),
                owner: "plugin-a".to_string(),
                token_id: token.id,
                payload: serde_json::json!({}),
            })
            .await
            .unwrap();

        let results = facade.process_tasks().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TaskStatus::Completed);
    }
}
