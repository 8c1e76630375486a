//! The plugin contract: an immutable manifest plus four lifecycle operations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::foundation::context::PluginContext;

/// Identity and dependency metadata for a plugin, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique, lowercase-kebab plugin id (e.g. `"resource-limits"`).
    pub id: String,
    /// Semantic version string.
    pub version: String,
    /// Human-readable display name.
    pub name: String,
    /// Capability tags this plugin advertises.
    pub capabilities: BTreeSet<String>,
    /// Ids of plugins that must be booted before this one.
    pub dependencies: Vec<String>,
}

impl PluginManifest {
    /// Builds a manifest, validating that `id` is lowercase-kebab (letters,
    /// digits, and `-`, with no uppercase).
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ManifestError> {
        let id = id.into();
        if !is_lowercase_kebab(&id) {
            return Err(ManifestError::InvalidId(id));
        }
        Ok(Self {
            id,
            version: version.into(),
            name: name.into(),
            capabilities: BTreeSet::new(),
            dependencies: Vec::new(),
        })
    }

    /// Adds a capability tag, builder-style.
    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    /// Adds a dependency id, builder-style.
    pub fn with_dependency(mut self, plugin_id: impl Into<String>) -> Self {
        self.dependencies.push(plugin_id.into());
        self
    }
}

fn is_lowercase_kebab(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !id.starts_with('-')
        && !id.ends_with('-')
}

/// The result of a single lifecycle operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResult {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// An optional human-readable message, present on failure (and
    /// optionally on success).
    pub message: Option<String>,
}

impl LifecycleResult {
    /// Builds a successful result with no message.
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    /// Builds a successful result carrying an informational message.
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
        }
    }

    /// Builds a failed result carrying a diagnostic message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

/// The lifecycle state of a managed plugin.
///
/// Transitions are monotonic per phase: `Registered -> Initialized ->
/// Started -> Stopped`, with `Error` as a terminal absorbing state reachable
/// from any of the first three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// Registered with the loader but not yet initialized.
    Registered,
    /// `init` succeeded.
    Initialized,
    /// `start` succeeded.
    Started,
    /// `stop` has run (successfully or not).
    Stopped,
    /// `init` or `start` reported failure or panicked. Terminal.
    Error,
}

/// The contract every managed plugin implements.
///
/// A plugin is polymorphic over four lifecycle operations plus an immutable
/// manifest fetched once at registration. `destroy` is optional — the
/// default implementation is a no-op success.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns this plugin's immutable manifest.
    fn manifest(&self) -> &PluginManifest;

    /// Initializes the plugin with its injected context: subscribe to
    /// topics, register invariants, validate configuration.
    async fn init(&self, ctx: &PluginContext) -> LifecycleResult;

    /// Starts the plugin's runtime behavior after every plugin has been
    /// initialized.
    async fn start(&self) -> LifecycleResult;

    /// Stops the plugin's runtime behavior during shutdown.
    async fn stop(&self) -> LifecycleResult;

    /// Releases any resources held beyond `stop`. Optional; defaults to a
    /// no-op success.
    async fn destroy(&self) -> LifecycleResult {
        LifecycleResult::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_rejects_non_kebab_ids() {
        assert!(PluginManifest::new("Bad-Id", "1.0.0", "Bad").is_err());
        assert!(PluginManifest::new("bad_id", "1.0.0", "Bad").is_err());
        assert!(PluginManifest::new("-bad", "1.0.0", "Bad").is_err());
        assert!(PluginManifest::new("good-id", "1.0.0", "Good").is_ok());
    }

    #[test]
    fn manifest_builder_accumulates_capabilities_and_deps() {
        let manifest = PluginManifest::new("resource-limits", "0.1.0", "Resource Limits")
            .unwrap()
            .with_capability("governance")
            .with_dependency("state-registry");
        assert!(manifest.capabilities.contains("governance"));
        assert_eq!(manifest.dependencies, vec!["state-registry".to_string()]);
    }
}
