//! # Warden Loader
//!
//! Registers plugins, resolves a safe boot order via Kahn's algorithm, and
//! drives the boot/shutdown lifecycle sequence, injecting a
//! [`PluginContext`](warden_core::PluginContext) into each plugin.

pub mod error;
pub mod loader;

pub use error::{LoaderError, LoaderResult};
pub use loader::CoreLoader;
