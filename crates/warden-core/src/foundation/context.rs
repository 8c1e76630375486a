//! The context handed to a plugin at each lifecycle step.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::bus::EventBus;
use super::invariant::InvariantEngine;

/// A small structured-logging façade scoped to a single plugin id.
///
/// Every call is a thin wrapper over a `tracing` macro with the plugin id
/// attached as a field, so plugin log lines are filterable the same way as
/// core log lines.
#[derive(Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    pub(crate) fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    /// Logs at debug level.
    pub fn debug(&self, message: &str) {
        debug!(plugin = %self.plugin_id, "{}", message);
    }

    /// Logs at info level.
    pub fn info(&self, message: &str) {
        info!(plugin = %self.plugin_id, "{}", message);
    }

    /// Logs at warn level.
    pub fn warn(&self, message: &str) {
        warn!(plugin = %self.plugin_id, "{}", message);
    }

    /// Logs at error level.
    pub fn error(&self, message: &str) {
        error!(plugin = %self.plugin_id, "{}", message);
    }
}

/// The context a plugin is given at every lifecycle step and, later, for the
/// lifetime of its running state.
///
/// `PluginContext` bundles everything a plugin needs to participate in the
/// control plane: the shared bus to publish/subscribe on, the shared
/// invariant engine to register governance predicates against, a
/// plugin-scoped logger, and the plugin's own configuration fragment.
#[derive(Clone)]
pub struct PluginContext {
    /// The id of the plugin this context was built for.
    pub plugin_id: String,
    /// The shared event bus.
    pub bus: EventBus,
    /// The shared invariant engine.
    pub invariants: Arc<InvariantEngine>,
    /// The plugin's own configuration fragment, as parsed JSON.
    pub config: Value,
    /// A logger scoped to this plugin's id.
    pub logger: PluginLogger,
}

impl PluginContext {
    /// Builds a new context for `plugin_id`.
    pub fn new(
        plugin_id: impl Into<String>,
        bus: EventBus,
        invariants: Arc<InvariantEngine>,
        config: Value,
    ) -> Self {
        let plugin_id = plugin_id.into();
        let logger = PluginLogger::new(plugin_id.clone());
        Self {
            plugin_id,
            bus,
            invariants,
            config,
            logger,
        }
    }
}
