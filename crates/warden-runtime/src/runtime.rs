//! The `WardenRuntime`: assembles the core loader, the governor plugin, and
//! configuration into one orchestrated process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{info, warn};
use warden_core::{EventBus, InvariantEngine, Plugin};
use warden_governor::{GovernorPlugin, PolicyEngine, TaskExecutor};
use warden_loader::CoreLoader;

use crate::config::{PolicyRuleConfig, WardenConfig};
use crate::error::{RuntimeError, RuntimeResult};

fn bootstrap_policy_rules(policy: &PolicyEngine, rules: &[PolicyRuleConfig]) -> RuntimeResult<()> {
    use warden_governor::{CpuThreshold, MemoryThreshold, PriorityThrottle, QueueDepthRule};

    for rule in rules {
        let result = match rule {
            PolicyRuleConfig::CpuThreshold { id, priority, theta } => {
                policy.register(Arc::new(CpuThreshold::new(id.clone(), *priority, *theta)))
            }
            PolicyRuleConfig::MemoryThreshold { id, priority, theta } => {
                policy.register(Arc::new(MemoryThreshold::new(id.clone(), *priority, *theta)))
            }
            PolicyRuleConfig::QueueDepthRule { id, priority, max_depth } => {
                policy.register(Arc::new(QueueDepthRule::new(id.clone(), *priority, *max_depth)))
            }
            PolicyRuleConfig::PriorityThrottle {
                id,
                priority,
                min_priority,
                load_threshold,
            } => policy.register(Arc::new(PriorityThrottle::new(
                id.clone(),
                *priority,
                *min_priority,
                *load_threshold,
            ))),
        };
        result.map_err(|e| RuntimeError::PolicyBootstrap(e.to_string()))?;
    }
    Ok(())
}

/// Orchestrates the control plane: the core loader, the governor plugin, and
/// whatever additional plugins the embedder registers before calling `init`.
pub struct WardenRuntime {
    loader: CoreLoader,
    governor: Arc<GovernorPlugin>,
    config: WardenConfig,
    running: AtomicBool,
}

impl WardenRuntime {
    /// Assembles a runtime from `config`, wiring the governor's token
    /// issuer, policy engine, and build queue around `executor`.
    pub fn new(config: WardenConfig, executor: Arc<dyn TaskExecutor>) -> RuntimeResult<Self> {
        let loader = CoreLoader::with_configs(config.plugins.clone());
        let limits = config.governor.to_resource_limits();
        let governor = Arc::new(GovernorPlugin::new(limits, executor, loader.bus().clone()));
        bootstrap_policy_rules(governor.facade().policy(), &config.governor.policy_rules)?;

        Ok(Self {
            loader,
            governor,
            config,
            running: AtomicBool::new(false),
        })
    }

    /// The shared event bus.
    pub fn bus(&self) -> &EventBus {
        self.loader.bus()
    }

    /// The shared invariant engine.
    pub fn invariants(&self) -> &Arc<InvariantEngine> {
        self.loader.invariants()
    }

    /// The governor plugin (also registered with the loader on `init`).
    pub fn governor(&self) -> &Arc<GovernorPlugin> {
        &self.governor
    }

    /// The configuration this runtime was built from.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Whether `init` has completed successfully and `stop` has not yet run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registers an additional plugin with the loader. Must be called before
    /// `init`.
    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> anyhow::Result<()> {
        self.loader.register(plugin).await?;
        Ok(())
    }

    /// Registers the governor plugin and boots every registered plugin in
    /// dependency order.
    pub async fn init(&self) -> anyhow::Result<()> {
        self.loader
            .register(Arc::clone(&self.governor) as Arc<dyn Plugin>)
            .await?;
        let order = self.loader.boot().await?;
        info!(?order, "warden runtime booted");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Shuts down every booted plugin in reverse boot order. A no-op if
    /// `init` never ran.
    pub async fn stop(&self) -> anyhow::Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("warden runtime is not running");
            return Ok(());
        }
        self.loader.shutdown().await;
        info!("warden runtime stopped");
        Ok(())
    }

    /// Runs until a Ctrl+C or SIGTERM signal is received, then shuts down.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.init().await?;
        info!("warden runtime is running; press Ctrl+C to stop");
        wait_for_shutdown_signal().await;
        self.stop().await
    }

    /// Runs until `shutdown` resolves, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.init().await?;
        shutdown.await;
        self.stop().await
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoExecutor;

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(&self, task: &warden_governor::QueuedTask) -> Result<serde_json::Value, String> {
            Ok(task.payload.clone())
        }
    }

    #[tokio::test]
    async fn init_boots_the_governor_plugin_and_stop_shuts_it_down() {
        let runtime = WardenRuntime::new(WardenConfig::default(), Arc::new(EchoExecutor)).unwrap();
        runtime.init().await.unwrap();
        assert!(runtime.is_running());

        let snapshot = runtime
            .governor()
            .request_token(warden_governor::TokenRequest::new("test"))
            .await
            .unwrap();
        assert!(snapshot.cpu_millis > 0);

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn policy_rules_from_config_are_registered_before_boot() {
        let mut config = WardenConfig::default();
        config.governor.policy_rules.push(PolicyRuleConfig::CpuThreshold {
            id: "cpu-guard".to_string(),
            priority: 10,
            theta: 0.0,
        });
        let runtime = WardenRuntime::new(config, Arc::new(EchoExecutor)).unwrap();

        let err = runtime
            .governor()
            .request_token(warden_governor::TokenRequest::new("test"))
            .await
            .unwrap_err();
        assert!(matches!(err, warden_governor::GovernorError::Denied { .. }));
    }
}
