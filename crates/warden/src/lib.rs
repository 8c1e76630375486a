//! # Warden
//!
//! A modular, in-process control plane that governs a fleet of pluggable
//! subsystems ("plugins") coordinating over a shared event bus, with
//! fail-closed governance invariants and a resource-bounded execution layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌───────────┐     ┌──────────┐
//! │ CoreLoader │────▶│ EventBus  │◀───▶│ Plugins  │
//! └────────────┘     └───────────┘     └──────────┘
//!        │                                   │
//!        ▼                                   ▼
//! ┌────────────────┐                ┌──────────────────┐
//! │ InvariantEngine │◀──────────────│ GovernorFacade    │
//! └────────────────┘                │ (tokens, policy,  │
//!                                   │  audit, queue)    │
//!                                   └──────────────────┘
//! ```
//!
//! - **Core Loader**: registers plugins, resolves a dependency-respecting
//!   boot order, and drives `init`/`start`/`stop`/`destroy`.
//! - **Event Bus**: topic-routed, fault-isolated publish/subscribe shared by
//!   every plugin.
//! - **Invariant Engine**: fail-closed governance predicates, evaluated as a
//!   conjunction against a caller-supplied context.
//! - **Governor**: mints resource tokens, evaluates policy, audits every
//!   decision, and drains a priority-ordered build queue.
//! - **Sandbox**: a plugin built atop the core that records events for
//!   content-hashed snapshots, sequence-ordered replay, and amendment
//!   simulation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = warden_runtime::config::load_config()?;
//!     let runtime = WardenRuntime::new(config, my_task_executor)?;
//!
//!     runtime.register_plugin(Arc::new(SandboxPlugin::new())).await?;
//!
//!     runtime.run().await
//! }
//! ```

pub use warden_core::*;
pub use warden_governor;
pub use warden_loader;
pub use warden_runtime;
pub use warden_sandbox;
pub use warden_state;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime — main entry point
    pub use warden_runtime::{WardenRuntime, config::WardenConfig};

    // Core contracts plugins implement
    pub use warden_core::{
        Event, EventBus, InvariantCheck, InvariantEngine, LifecycleResult, Plugin, PluginContext,
        PluginManifest, PluginState,
    };

    // Loader
    pub use warden_loader::CoreLoader;

    // Governor — token issuance, policy, and the build queue
    pub use warden_governor::{
        GovernorFacade, GovernorPlugin, ResourceLimits, TaskExecutor, TokenRequest, TokenSnapshot,
    };

    // State registry
    pub use warden_state::StateRegistry;

    // Sandbox
    pub use warden_sandbox::{AmendmentSimulator, SandboxPlugin, replay};
}
