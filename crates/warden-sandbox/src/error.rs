//! Sandbox failure taxonomy.

use thiserror::Error;

/// Errors raised by the snapshot serializer and amendment simulator.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// The recomputed content hash did not match the hash stored alongside
    /// the canonical JSON encoding.
    #[error("snapshot hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// The hash recorded in the serialized snapshot.
        expected: String,
        /// The hash recomputed over the canonical JSON at deserialize time.
        computed: String,
    },

    /// The canonical JSON could not be parsed back into a snapshot.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// An amendment's prerequisite has not been activated.
    #[error("prerequisite '{0}' is not active")]
    PrerequisiteNotActive(String),
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
