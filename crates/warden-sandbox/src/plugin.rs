//! The sandbox plugin: a thin [`Plugin`] wrapper that records every bus
//! event for later snapshot and replay.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use warden_core::{FnHandler, LifecycleResult, Plugin, PluginContext, PluginManifest};

use crate::snapshot::{AmendmentRecord, SandboxEvent, SandboxSnapshot};

/// Records every event published on the bus, and assembles
/// [`SandboxSnapshot`]s from that log plus a caller-supplied state map.
pub struct SandboxPlugin {
    manifest: PluginManifest,
    recorded: Arc<RwLock<Vec<SandboxEvent>>>,
    amendments: Arc<RwLock<Vec<AmendmentRecord>>>,
}

impl SandboxPlugin {
    /// Builds an unstarted sandbox plugin.
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("sandbox", "0.1.0", "Sandbox")
                .expect("'sandbox' is a valid lowercase-kebab id")
                .with_capability("sandbox"),
            recorded: Arc::new(RwLock::new(Vec::new())),
            amendments: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns every event recorded so far, in recorded order.
    pub fn recorded_events(&self) -> Vec<SandboxEvent> {
        self.recorded.read().clone()
    }

    /// Records that `amendment_id` was activated, for inclusion in future snapshots.
    pub fn record_amendment(&self, record: AmendmentRecord) {
        self.amendments.write().push(record);
    }

    /// Assembles a snapshot from the recorded event log, recorded
    /// amendments, and the caller-supplied state map (typically a
    /// [`StateRegistry`](warden_state::StateRegistry) snapshot's entries,
    /// re-keyed into a sorted `serde_json::Map` for canonical encoding).
    pub fn snapshot(&self, state: std::collections::HashMap<String, serde_json::Value>) -> SandboxSnapshot {
        SandboxSnapshot {
            state: state.into_iter().collect(),
            events: self.recorded_events(),
            amendments: self.amendments.read().clone(),
        }
    }
}

impl Default for SandboxPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SandboxPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, ctx: &PluginContext) -> LifecycleResult {
        let recorded = Arc::clone(&self.recorded);
        ctx.bus.subscribe(
            "*",
            Arc::new(FnHandler(move |event| {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.write().push(SandboxEvent::from(&event));
                    Ok(())
                }
            })),
        );
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
    use warden_core::{EventBus, InvariantEngine};

    #[tokio::test]
    async fn init_subscribes_and_records_every_event() {
        let plugin = SandboxPlugin::new();
        let bus = EventBus::new();
        let ctx = PluginContext::new(
            "sandbox",
            bus.clone(),
            Arc::new(InvariantEngine::new()),
            serde_json::json!({}),
        );
        plugin.init(&ctx).await;

        bus.publish("health.check", "core", serde_json::json!({"ok": true})).await;
        bus.publish("config.updated", "core", serde_json::json!({"k": "v"})).await;

        let recorded = plugin.recorded_events();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].topic, "health.check");
        assert_eq!(recorded[1].topic, "config.updated");
    }
}
