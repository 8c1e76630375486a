//! # Warden State
//!
//! An append-only, globally versioned key-value state registry: every
//! mutation is logged as a [`Transition`](registry::Transition) and the
//! whole map can be snapshotted and restored.

pub mod registry;

pub use registry::{Snapshot, StateRegistry, Transition};
