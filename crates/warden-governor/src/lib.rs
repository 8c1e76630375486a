//! # Warden Governor
//!
//! The resource-bounded execution layer: a token issuer, a priority-ordered
//! policy engine, an append-only audit log, and a priority build queue,
//! bundled behind a [`GovernorFacade`] and exposed to the loader as a
//! [`GovernorPlugin`].

pub mod audit;
pub mod error;
pub mod facade;
pub mod plugin;
pub mod policy;
pub mod queue;
pub mod token;

pub use audit::{AuditEntry, AuditLog};
pub use error::{GovernorError, GovernorResult};
pub use facade::GovernorFacade;
pub use plugin::GovernorPlugin;
pub use policy::{
    CpuThreshold, MemoryThreshold, PolicyContext, PolicyDecision, PolicyEngine, PolicyRequest,
    PolicyRule, PolicyVerdict, PriorityThrottle, QueueDepthRule,
};
pub use queue::{BuildQueue, QueuedTask, SubmitRequest, TaskExecutor, TaskStatus};
pub use token::{ResourceLimits, ResourceUsage, TokenIssuer, TokenRequest, TokenSnapshot};
