//! Governor failure taxonomy.

use thiserror::Error;

/// Errors raised by the governor's token issuer, policy engine, and build
/// queue.
#[derive(Debug, Clone, Error)]
pub enum GovernorError {
    /// A policy rule with this id is already registered.
    #[error("policy rule '{0}' is already registered")]
    DuplicateRuleId(String),

    /// Issuing or re-issuing a token would exceed fleet resource limits.
    #[error("budget exceeded: {remaining_cpu} cpu-millis and {remaining_mem} bytes remaining")]
    BudgetExceeded {
        /// Remaining CPU budget in milliseconds before this request.
        remaining_cpu: u64,
        /// Remaining memory budget in bytes before this request.
        remaining_mem: u64,
    },

    /// The referenced token id is unknown or no longer active.
    #[error("invalid token '{0}'")]
    InvalidToken(String),

    /// The build queue is at `max-queue-depth`.
    #[error("queue is at capacity")]
    QueueFull,

    /// Policy evaluation returned `deny`.
    #[error("denied by policy rule '{deciding_rule}'")]
    Denied {
        /// The id of the rule that produced the denial.
        deciding_rule: String,
    },
}

/// Result type for governor operations.
pub type GovernorResult<T> = Result<T, GovernorError>;
