//! The Core Loader: plugin registration, dependency resolution, and
//! lifecycle orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use warden_core::{EventBus, InvariantEngine, Plugin, PluginState};

use crate::error::{LoaderError, LoaderResult};

struct ManagedPlugin {
    plugin: Arc<dyn Plugin>,
    state: PluginState,
}

struct LoaderState {
    plugins: HashMap<String, ManagedPlugin>,
    /// Registration order, used as the Kahn's-algorithm tie-break for equal
    /// in-degree so boot order is reproducible run to run.
    order: Vec<String>,
    last_boot_order: Option<Vec<String>>,
}

impl LoaderState {
    fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            order: Vec::new(),
            last_boot_order: None,
        }
    }
}

/// Owns every registered plugin, the shared bus, and the shared invariant
/// engine; drives the boot and shutdown sequences.
///
/// The loader drives lifecycle sequentially — there is no parallel `init` or
/// `start` — so boot order is a flat sequence, not parallel layers.
pub struct CoreLoader {
    state: RwLock<LoaderState>,
    bus: EventBus,
    invariants: Arc<InvariantEngine>,
    configs: HashMap<String, Value>,
}

impl CoreLoader {
    /// Creates a new loader around a fresh bus and invariant engine.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LoaderState::new()),
            bus: EventBus::new(),
            invariants: Arc::new(InvariantEngine::new()),
            configs: HashMap::new(),
        }
    }

    /// Creates a loader with a per-plugin configuration map, keyed by plugin
    /// id, used to populate each plugin's [`PluginContext`](warden_core::PluginContext).
    pub fn with_configs(configs: HashMap<String, Value>) -> Self {
        Self {
            configs,
            ..Self::new()
        }
    }

    /// Returns the shared event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the shared invariant engine.
    pub fn invariants(&self) -> &Arc<InvariantEngine> {
        &self.invariants
    }

    /// Registers a plugin. Fails if a plugin with the same manifest id is
    /// already registered.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> LoaderResult<()> {
        let id = plugin.manifest().id.clone();
        let mut state = self.state.write().await;
        if state.plugins.contains_key(&id) {
            return Err(LoaderError::DuplicateRegistration(id));
        }
        state.order.push(id.clone());
        state.plugins.insert(
            id,
            ManagedPlugin {
                plugin,
                state: PluginState::Registered,
            },
        );
        Ok(())
    }

    /// Returns the current lifecycle state of `plugin_id`, if registered.
    pub async fn state_of(&self, plugin_id: &str) -> Option<PluginState> {
        self.state.read().await.plugins.get(plugin_id).map(|m| m.state)
    }

    /// Returns the boot order from the most recent successful `boot`, if any.
    pub async fn last_boot_order(&self) -> Option<Vec<String>> {
        self.state.read().await.last_boot_order.clone()
    }

    fn resolve_boot_order(
        plugins: &HashMap<String, ManagedPlugin>,
        order: &[String],
    ) -> LoaderResult<Vec<String>> {
        let mut in_degree: HashMap<String, usize> = order.iter().map(|id| (id.clone(), 0)).collect();
        let mut dependents: HashMap<String, Vec<String>> =
            order.iter().map(|id| (id.clone(), Vec::new())).collect();

        for id in order {
            let managed = &plugins[id];
            for dep in &managed.plugin.manifest().dependencies {
                if !plugins.contains_key(dep) {
                    return Err(LoaderError::UnresolvedDependency {
                        plugin: id.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents.get_mut(dep).unwrap().push(id.clone());
                *in_degree.get_mut(id).unwrap() += 1;
            }
        }

        let mut resolved = Vec::with_capacity(order.len());
        let mut frontier: Vec<String> = order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .cloned()
            .collect();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in &frontier {
                for dependent in &dependents[id] {
                    let degree = in_degree.get_mut(dependent).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(dependent.clone());
                    }
                }
            }
            resolved.extend(frontier);
            frontier = next;
        }

        if resolved.len() != order.len() {
            let residual: Vec<String> = order
                .iter()
                .filter(|id| in_degree[*id] > 0)
                .cloned()
                .collect();
            return Err(LoaderError::Cycle(residual));
        }

        Ok(resolved)
    }

    /// Resolves a safe boot order, then awaits `init` and `start` on every
    /// plugin in that order, fail-fast on the first non-ok or panicking
    /// result. On success, publishes `core.boot.complete` naming the order.
    ///
    /// Rejects a second `boot` call outright: every registered plugin must
    /// still be `Registered` (untouched by a prior boot) or this raises
    /// `IllegalStateTransition` naming the first plugin that isn't.
    pub async fn boot(&self) -> LoaderResult<Vec<String>> {
        let order = {
            let state = self.state.read().await;
            for id in &state.order {
                let current = state.plugins[id].state;
                if current != PluginState::Registered {
                    return Err(LoaderError::IllegalStateTransition {
                        plugin: id.clone(),
                        state: format!("{current:?}"),
                    });
                }
            }
            Self::resolve_boot_order(&state.plugins, &state.order)?
        };

        for id in &order {
            let plugin = {
                let state = self.state.read().await;
                Arc::clone(&state.plugins[id].plugin)
            };
            let ctx = warden_core::PluginContext::new(
                id.clone(),
                self.bus.clone(),
                Arc::clone(&self.invariants),
                self.configs.get(id).cloned().unwrap_or(Value::Null),
            );

            let result = std::panic::AssertUnwindSafe(plugin.init(&ctx))
                .catch_unwind()
                .await;

            let outcome = match result {
                Ok(lifecycle) if lifecycle.ok => Ok(()),
                Ok(lifecycle) => Err(lifecycle.message.unwrap_or_else(|| "init failed".to_string())),
                Err(_) => Err("init panicked".to_string()),
            };

            let mut state = self.state.write().await;
            match outcome {
                Ok(()) => {
                    state.plugins.get_mut(id).unwrap().state = PluginState::Initialized;
                }
                Err(message) => {
                    state.plugins.get_mut(id).unwrap().state = PluginState::Error;
                    return Err(LoaderError::InitFailed {
                        plugin: id.clone(),
                        message,
                    });
                }
            }
        }

        for id in &order {
            let plugin = {
                let state = self.state.read().await;
                Arc::clone(&state.plugins[id].plugin)
            };

            let result = std::panic::AssertUnwindSafe(plugin.start()).catch_unwind().await;

            let outcome = match result {
                Ok(lifecycle) if lifecycle.ok => Ok(()),
                Ok(lifecycle) => Err(lifecycle.message.unwrap_or_else(|| "start failed".to_string())),
                Err(_) => Err("start panicked".to_string()),
            };

            let mut state = self.state.write().await;
            match outcome {
                Ok(()) => {
                    state.plugins.get_mut(id).unwrap().state = PluginState::Started;
                }
                Err(message) => {
                    state.plugins.get_mut(id).unwrap().state = PluginState::Error;
                    return Err(LoaderError::StartFailed {
                        plugin: id.clone(),
                        message,
                    });
                }
            }
        }

        self.state.write().await.last_boot_order = Some(order.clone());
        info!(order = ?order, "boot complete");
        self.bus
            .publish("core.boot.complete", "core-loader", serde_json::json!({ "order": order }))
            .await;

        Ok(order)
    }

    /// Iterates the reverse of the last boot order, stopping every plugin
    /// currently `started` (failures logged, not fatal), then iterates again
    /// calling `destroy` on each of those. Publishes `core.shutdown.complete`.
    ///
    /// A no-op if `boot` has never succeeded.
    pub async fn shutdown(&self) {
        let reverse_order = {
            let state = self.state.read().await;
            match &state.last_boot_order {
                Some(order) => {
                    let mut reversed = order.clone();
                    reversed.reverse();
                    reversed
                }
                None => return,
            }
        };

        let mut stopped = Vec::new();
        for id in &reverse_order {
            let (plugin, should_stop) = {
                let state = self.state.read().await;
                let managed = &state.plugins[id];
                (Arc::clone(&managed.plugin), managed.state == PluginState::Started)
            };
            if !should_stop {
                continue;
            }

            match std::panic::AssertUnwindSafe(plugin.stop()).catch_unwind().await {
                Ok(lifecycle) if !lifecycle.ok => {
                    warn!(plugin = %id, message = ?lifecycle.message, "plugin stop reported failure");
                }
                Err(_) => {
                    warn!(plugin = %id, "plugin stop panicked");
                }
                Ok(_) => {}
            }

            self.state.write().await.plugins.get_mut(id).unwrap().state = PluginState::Stopped;
            stopped.push(id.clone());
        }

        for id in &stopped {
            let plugin = {
                let state = self.state.read().await;
                Arc::clone(&state.plugins[id].plugin)
            };
            if let Err(_) = std::panic::AssertUnwindSafe(plugin.destroy()).catch_unwind().await {
                error!(plugin = %id, "plugin destroy panicked");
            }
        }

        info!(order = ?reverse_order, "shutdown complete");
        self.bus
            .publish(
                "core.shutdown.complete",
                "core-loader",
                serde_json::json!({ "order": reverse_order }),
            )
            .await;
    }
}

impl Default for CoreLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use warden_core::{LifecycleResult, PluginContext, PluginManifest};

    struct RecordingPlugin {
        manifest: PluginManifest,
        log: Arc<StdMutex<Vec<String>>>,
        fail_init: bool,
    }

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn manifest(&self) -> &PluginManifest {
            &self.manifest
        }

        async fn init(&self, _ctx: &PluginContext) -> LifecycleResult {
            self.log.lock().unwrap().push(format!("init:{}", self.manifest.id));
            if self.fail_init {
                LifecycleResult::failed("boom")
            } else {
                LifecycleResult::ok()
            }
        }

        async fn start(&self) -> LifecycleResult {
            self.log.lock().unwrap().push(format!("start:{}", self.manifest.id));
            LifecycleResult::ok()
        }

        async fn stop(&self) -> LifecycleResult {
            self.log.lock().unwrap().push(format!("stop:{}", self.manifest.id));
            LifecycleResult::ok()
        }
    }

    fn plugin(id: &str, deps: &[&str], log: Arc<StdMutex<Vec<String>>>) -> Arc<dyn Plugin> {
        let mut manifest = PluginManifest::new(id, "0.1.0", id).unwrap();
        for dep in deps {
            manifest = manifest.with_dependency(*dep);
        }
        Arc::new(RecordingPlugin {
            manifest,
            log,
            fail_init: false,
        })
    }

    #[tokio::test]
    async fn dependency_ordering_scenario() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        loader.register(plugin("a", &[], log.clone())).await.unwrap();
        loader.register(plugin("b", &["a"], log.clone())).await.unwrap();
        loader.register(plugin("c", &["a", "b"], log.clone())).await.unwrap();

        let order = loader.boot().await.unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);

        loader.shutdown().await;

        let recorded = log.lock().unwrap().clone();
        assert_eq!(
            recorded,
            vec![
                "init:a", "init:b", "init:c", "start:a", "start:b", "start:c", "stop:c", "stop:b",
                "stop:a",
            ]
        );
    }

    #[tokio::test]
    async fn cycle_is_rejected_naming_both_members() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        loader.register(plugin("x", &["y"], log.clone())).await.unwrap();
        loader.register(plugin("y", &["x"], log.clone())).await.unwrap();

        let err = loader.boot().await.unwrap_err();
        match err {
            LoaderError::Cycle(members) => {
                assert_eq!(members.len(), 2);
                assert!(members.contains(&"x".to_string()));
                assert!(members.contains(&"y".to_string()));
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_dependency_is_rejected() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        loader.register(plugin("a", &["ghost"], log)).await.unwrap();

        let err = loader.boot().await.unwrap_err();
        assert!(matches!(err, LoaderError::UnresolvedDependency { .. }));
    }

    #[tokio::test]
    async fn init_failure_halts_boot_and_marks_error() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        let failing = Arc::new(RecordingPlugin {
            manifest: PluginManifest::new("bad", "0.1.0", "bad").unwrap(),
            log: log.clone(),
            fail_init: true,
        });
        loader.register(failing).await.unwrap();
        loader.register(plugin("never-runs", &["bad"], log.clone())).await.unwrap();

        let err = loader.boot().await.unwrap_err();
        assert!(matches!(err, LoaderError::InitFailed { .. }));
        assert_eq!(loader.state_of("bad").await, Some(PluginState::Error));
        assert!(!log.lock().unwrap().contains(&"init:never-runs".to_string()));
    }

    #[tokio::test]
    async fn rebooting_an_already_booted_loader_is_rejected() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        loader.register(plugin("a", &[], log)).await.unwrap();
        loader.boot().await.unwrap();

        let err = loader.boot().await.unwrap_err();
        assert!(matches!(err, LoaderError::IllegalStateTransition { .. }));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let loader = CoreLoader::new();
        loader.register(plugin("a", &[], log.clone())).await.unwrap();
        let err = loader.register(plugin("a", &[], log)).await;
        assert!(matches!(err, Err(LoaderError::DuplicateRegistration(_))));
    }
}
