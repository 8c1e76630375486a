//! # Warden Core
//!
//! The core engine of the Warden control plane.
//!
//! This crate provides the fundamental building blocks shared by every
//! subsystem: the event bus, the invariant engine, the plugin contract, and
//! the external interfaces the core consumes without owning.
//!
//! ## Architecture Layers
//!
//! Warden Core is organized into two layers plus the plugin contract that
//! sits between them:
//!
//! ### Foundation Layer
//!
//! - **Event Bus**: topic-routed, fault-isolated publish/subscribe ([`EventBus`])
//! - **Invariant Engine**: fail-closed governance predicates ([`InvariantEngine`])
//! - **Plugin Context**: the value bundle injected at `init` ([`PluginContext`])
//!
//! ### Integration Layer
//!
//! External contracts the core consumes but does not implement:
//! - **Chain Adapter**: `(family, network)`-indexed protocol adapters ([`ChainAdapter`])
//! - **Container Runtime**: a small interface for container orchestration ([`ContainerRuntime`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use warden_core::{EventBus, FnHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = EventBus::new();
//!     bus.subscribe("health.*", Arc::new(FnHandler(|event| async move {
//!         println!("received {}", event.topic);
//!         Ok(())
//!     })));
//!     bus.publish("health.check", "core", serde_json::json!({"ok": true})).await;
//! }
//! ```

pub mod error;
pub mod foundation;
pub mod integration;
pub mod plugin;

pub use error::{AdapterError, AdapterResult, ContainerError, ContainerResult, InvariantError, InvariantResult, ManifestError};
pub use foundation::{
    Event, EventBus, EventPayload, FnHandler, FnInvariant, Handler, InvariantCheck, InvariantEngine,
    InvariantInfo, InvariantOutcome, PluginContext, PluginLogger, SubscriptionHandle, TopicPattern,
    Verdict,
};
pub use integration::{
    AdapterRegistry, AdapterStatus, ChainAdapter, ChainQueryResult, ContainerRuntime, ContainerSpec,
    ContainerStatus, ExecResult, HealthCheckResult,
};
pub use plugin::{LifecycleResult, Plugin, PluginManifest, PluginState};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::integration::*;
    pub use super::plugin::{LifecycleResult, Plugin, PluginManifest, PluginState};
}
