//! Runtime orchestration error type.
//!
//! `anyhow::Result` is used at the orchestration boundaries
//! ([`WardenRuntime::init`](crate::WardenRuntime::init)/`start`/`stop`/`run`)
//! that aggregate heterogeneous errors from the loader, governor, and config
//! layers; this type covers the failures `WardenRuntime` itself raises.

use thiserror::Error;

/// Errors raised directly by [`WardenRuntime`](crate::WardenRuntime), as
/// opposed to errors it propagates from `warden-loader` or `warden-governor`.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A policy rule bootstrap entry could not be registered (e.g. duplicate id).
    #[error("failed to bootstrap policy rule: {0}")]
    PolicyBootstrap(String),
}

/// Result type for runtime construction operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
