//! The governor's own [`Plugin`] implementation: wraps a [`GovernorFacade`]
//! and registers the `resource-limits` and `queue-depth` invariants.

use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{FnInvariant, LifecycleResult, Plugin, PluginContext, PluginManifest};

use crate::facade::GovernorFacade;
use crate::token::{ResourceLimits, TokenSnapshot, TokenRequest};
use crate::queue::{SubmitRequest, QueuedTask, TaskExecutor};
use crate::error::GovernorResult;

/// Wraps a [`GovernorFacade`] as a managed plugin, exposing the scheduling
/// operations other plugins call through it.
pub struct GovernorPlugin {
    manifest: PluginManifest,
    facade: Arc<GovernorFacade>,
    limits: ResourceLimits,
}

impl GovernorPlugin {
    /// Builds the governor plugin around `limits` and an injected executor.
    pub fn new(limits: ResourceLimits, executor: Arc<dyn TaskExecutor>, bus: warden_core::EventBus) -> Self {
        let manifest = PluginManifest::new("governor", "0.1.0", "Governor")
            .expect("'governor' is a valid lowercase-kebab id")
            .with_capability("governance");
        Self {
            manifest,
            facade: Arc::new(GovernorFacade::new(limits, executor, bus)),
            limits,
        }
    }

    /// Returns the underlying facade for direct use by the embedder (the
    /// loader only drives lifecycle; scheduling calls go straight through
    /// this handle).
    pub fn facade(&self) -> &Arc<GovernorFacade> {
        &self.facade
    }

    /// Requests a token through the wrapped facade.
    pub async fn request_token(&self, request: TokenRequest) -> GovernorResult<TokenSnapshot> {
        self.facade.request_token(request).await
    }

    /// Submits a task through the wrapped facade.
    pub async fn submit_task(&self, request: SubmitRequest) -> GovernorResult<String> {
        self.facade.submit_task(request).await
    }

    /// Drains the build queue through the wrapped facade.
    pub async fn process_tasks(&self) -> Vec<QueuedTask> {
        self.facade.process_tasks().await
    }
}

#[async_trait]
impl Plugin for GovernorPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> LifecycleResult {
        let facade = Arc::clone(&self.facade);
        let total_cpu = self.limits.total_cpu_millis;
        let total_mem = self.limits.total_memory_bytes;
        let registered = ctx.invariants.register(
            "resource-limits",
            "governor",
            "fleet usage, plus any requested headroom, must stay within configured totals",
            Arc::new(FnInvariant(move |context: &serde_json::Value| {
                let facade = Arc::clone(&facade);
                let requested_cpu = context.get("cpuMillis").and_then(|v| v.as_u64()).unwrap_or(0);
                let requested_mem = context.get("memoryBytes").and_then(|v| v.as_u64()).unwrap_or(0);
                async move {
                    let usage = facade.issuer().usage();
                    Ok(usage.cpu_millis + requested_cpu <= total_cpu
                        && usage.memory_bytes + requested_mem <= total_mem)
                }
            })),
        );
        if let Err(e) = registered {
            return LifecycleResult::failed(e.to_string());
        }

        let facade = Arc::clone(&self.facade);
        let max_queue_depth = self.limits.max_queue_depth;
        let registered = ctx.invariants.register(
            "queue-depth",
            "governor",
            "queued task count must stay under max-queue-depth",
            Arc::new(FnInvariant(move |_context: &serde_json::Value| {
                let facade = Arc::clone(&facade);
                async move { Ok(facade.queue().queue_depth() < max_queue_depth) }
            })),
        );
        if let Err(e) = registered {
            return LifecycleResult::failed(e.to_string());
        }

        LifecycleResult::ok()
    }

    async fn start(&self) -> LifecycleResult {
        LifecycleResult::ok()
    }

    async fn stop(&self) -> LifecycleResult {
        LifecycleResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::EventBus;

    struct AlwaysSucceeds;

    #[async_trait]
    impl TaskExecutor for AlwaysSucceeds {
        async fn execute(&self, _task: &QueuedTask) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({}))
        }
    }

    fn limits() -> ResourceLimits {
        ResourceLimits {
            total_cpu_millis: 4000,
            total_memory_bytes: 1024 * 1024 * 1024,
            max_concurrent: 4,
            max_queue_depth: 2,
        }
    }

    #[tokio::test]
    async fn resource_limits_invariant_reflects_live_usage() {
        let bus = EventBus::new();
        let plugin = GovernorPlugin::new(limits(), Arc::new(AlwaysSucceeds), bus.clone());
        let invariants = Arc::new(warden_core::InvariantEngine::new());
        let ctx = PluginContext::new("governor", bus, invariants.clone(), serde_json::json!({}));
        plugin.init(&ctx).await;

        let verdict = invariants.check(&serde_json::json!({ "cpuMillis": 100 })).await;
        assert!(verdict.allowed);

        plugin
            .request_token({
                let mut r = TokenRequest::new("plugin-a");
                r.cpu_millis = Some(3950);
                r
            })
            .await
            .unwrap();

        let verdict = invariants.check(&serde_json::json!({ "cpuMillis": 100 })).await;
        assert!(!verdict.allowed);
    }
}
