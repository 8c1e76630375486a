//! Loader failure taxonomy.

use thiserror::Error;

/// Errors raised while registering plugins or driving boot/shutdown.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// A plugin with this id is already registered.
    #[error("plugin '{0}' is already registered")]
    DuplicateRegistration(String),

    /// A plugin declares a dependency on an id that was never registered.
    #[error("plugin '{plugin}' depends on unregistered plugin '{dependency}'")]
    UnresolvedDependency {
        /// The dependent plugin's id.
        plugin: String,
        /// The missing dependency id.
        dependency: String,
    },

    /// The dependency graph contains a cycle; names every plugin still
    /// in the residual after Kahn's algorithm exhausts itself.
    #[error("dependency cycle detected among plugins: {0:?}")]
    Cycle(Vec<String>),

    /// A plugin's `init` reported failure or panicked.
    #[error("plugin '{plugin}' failed to initialize: {message}")]
    InitFailed {
        /// The failing plugin's id.
        plugin: String,
        /// The reported or captured failure message.
        message: String,
    },

    /// A plugin's `start` reported failure or panicked.
    #[error("plugin '{plugin}' failed to start: {message}")]
    StartFailed {
        /// The failing plugin's id.
        plugin: String,
        /// The reported or captured failure message.
        message: String,
    },

    /// An operation was requested against a plugin in a state that does not
    /// permit it (e.g. starting a plugin that was never initialized).
    #[error("plugin '{plugin}' is in state {state}, which does not permit this transition")]
    IllegalStateTransition {
        /// The plugin's id.
        plugin: String,
        /// A textual rendering of the plugin's current state.
        state: String,
    },
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
