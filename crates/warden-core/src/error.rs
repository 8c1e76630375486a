//! Unified error types for the Warden core crate.

use thiserror::Error;

/// Errors raised by the invariant engine.
#[derive(Debug, Clone, Error)]
pub enum InvariantError {
    /// An invariant with this name is already registered.
    #[error("invariant '{0}' is already registered")]
    DuplicateName(String),
}

/// Result type for invariant engine operations.
pub type InvariantResult<T> = Result<T, InvariantError>;

/// Errors raised by the adapter registry.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// An adapter is already registered for this `(family, network)` pair.
    #[error("adapter already registered for family '{family}' network '{network}'")]
    DuplicateAdapter {
        /// The adapter family.
        family: String,
        /// The network identifier.
        network: String,
    },

    /// No adapter is registered for the requested `(family, network)` pair.
    #[error("no adapter registered for family '{family}' network '{network}'")]
    NotFound {
        /// The adapter family.
        family: String,
        /// The network identifier.
        network: String,
    },

    /// A transport-level error occurred while connecting.
    #[error("adapter connection failed: {0}")]
    ConnectFailed(String),
}

/// Result type for adapter registry operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors raised by a container runtime implementation.
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// The requested container id is unknown to the runtime.
    #[error("unknown container '{0}'")]
    NotFound(String),

    /// The underlying runtime operation failed.
    #[error("container runtime error: {0}")]
    Runtime(String),
}

/// Result type for container runtime operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors raised while constructing or validating a plugin manifest.
#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    /// The manifest id does not follow the required lowercase-kebab convention.
    #[error("plugin id '{0}' must be lowercase-kebab (e.g. 'my-plugin')")]
    InvalidId(String),
}
