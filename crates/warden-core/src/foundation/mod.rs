//! Foundational building blocks shared by every part of the control plane:
//! the event envelope and bus, the invariant engine, and the plugin context.

pub mod bus;
pub mod context;
pub mod event;
pub mod invariant;

pub use bus::{EventBus, FnHandler, Handler, SubscriptionHandle};
pub use context::{PluginContext, PluginLogger};
pub use event::{Event, EventPayload, TopicPattern};
pub use invariant::{FnInvariant, InvariantCheck, InvariantEngine, InvariantInfo, InvariantOutcome, Verdict};
