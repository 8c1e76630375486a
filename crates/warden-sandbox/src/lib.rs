//! # Warden Sandbox
//!
//! Snapshot, replay, and amendment-simulation primitives for the sandbox
//! plugin: a content-hashed snapshot serializer, a sequence-ordered replay
//! engine, and a prerequisite-aware amendment simulator.

pub mod amendment;
pub mod error;
pub mod plugin;
pub mod replay;
pub mod snapshot;

pub use amendment::{Amendment, AmendmentEffect, AmendmentSimulator};
pub use error::{SandboxError, SandboxResult};
pub use plugin::SandboxPlugin;
pub use replay::{ReplayBounds, ReplayHandler, ReplayStep, StateDiffEntry, replay};
pub use snapshot::{AmendmentRecord, SandboxEvent, SandboxSnapshot, SerializedSnapshot, deserialize, serialize};
