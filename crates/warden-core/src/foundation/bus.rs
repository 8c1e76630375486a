//! The ordered, fault-isolated in-process event bus.
//!
//! Unlike the teacher's type-matched [`Dispatcher`](crate) this bus routes on
//! dot-delimited topic strings (exact, `prefix.*`, or `*`), but keeps the same
//! shape: a single owner struct guarding history and subscriptions behind one
//! lock, dispatching to matching subscribers in registration order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{Level, error, span};

use super::event::{Event, EventPayload, TopicPattern};

/// A handler invoked for every event matching its subscription pattern.
///
/// Handler failures are caught and logged by the bus; they never propagate
/// to the publisher and never prevent other handlers from running.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles a single event. An `Err` return is logged and swallowed.
    async fn handle(&self, event: Event) -> Result<(), String>;
}

/// Adapts a plain async closure into a [`Handler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), String>> + Send,
{
    async fn handle(&self, event: Event) -> Result<(), String> {
        (self.0)(event).await
    }
}

struct Subscription {
    id: u64,
    pattern: TopicPattern,
    handler: Arc<dyn Handler>,
}

struct BusState {
    sequence: u64,
    history: Vec<Event>,
    subscriptions: Vec<Subscription>,
}

impl BusState {
    fn new() -> Self {
        Self {
            sequence: 0,
            history: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}

/// A handle returned by [`EventBus::subscribe`] that cancels the subscription
/// when [`cancel`](SubscriptionHandle::cancel) is called.
pub struct SubscriptionHandle {
    id: u64,
    bus: Arc<RwLock<BusState>>,
}

impl SubscriptionHandle {
    /// Removes the associated subscription. A no-op if already cancelled or
    /// if the bus has since been [`reset`](EventBus::reset).
    pub fn cancel(self) {
        self.bus.write().subscriptions.retain(|s| s.id != self.id);
    }
}

/// The ordered, fault-isolated in-process event bus.
///
/// `EventBus` is cheaply cloneable (internally `Arc`-backed) and safe to
/// share across plugin contexts.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<RwLock<BusState>>,
    next_sub_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a new, empty event bus.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BusState::new())),
            next_sub_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers a handler for events whose topic matches `pattern`.
    ///
    /// Patterns: an exact topic string, a trailing `.*` prefix wildcard, or
    /// the literal `*` matching every topic. Multiple subscribers on the same
    /// pattern each receive the event.
    pub fn subscribe(&self, pattern: &str, handler: Arc<dyn Handler>) -> SubscriptionHandle {
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.state.write().subscriptions.push(Subscription {
            id,
            pattern: TopicPattern::parse(pattern),
            handler,
        });
        SubscriptionHandle {
            id,
            bus: Arc::clone(&self.state),
        }
    }

    /// Publishes an event, assigning the next sequence number and
    /// timestamp, appending it to history, then dispatching it to every
    /// matching subscriber in registration order.
    ///
    /// Handlers are awaited sequentially so that dispatch order — and the
    /// audit trail it produces — stays deterministic; a handler that spawns
    /// its own background work still returns control to the bus immediately.
    /// A handler error is caught and logged; it never aborts dispatch to the
    /// remaining subscribers, and never fails the publish itself.
    pub async fn publish<P: EventPayload>(
        &self,
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: P,
    ) -> u64 {
        let topic = topic.into();
        let source = source.into();
        let event = {
            let mut state = self.state.write();
            state.sequence += 1;
            let event = Event::new(
                topic.clone(),
                source,
                state.sequence,
                Utc::now(),
                Arc::new(payload),
            );
            state.history.push(event.clone());
            event
        };

        let matching: Vec<Arc<dyn Handler>> = {
            let state = self.state.read();
            state
                .subscriptions
                .iter()
                .filter(|s| s.pattern.matches(&topic))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        let span = span!(Level::DEBUG, "publish", topic = %topic, sequence = event.sequence);
        let _enter = span.enter();

        for handler in matching {
            if let Err(e) = handler.handle(event.clone()).await {
                error!(topic = %topic, error = %e, "event handler failed");
            }
        }

        event.sequence
    }

    /// Returns a snapshot copy of the full event history, in sequence order.
    pub fn history(&self) -> Vec<Event> {
        self.state.read().history.clone()
    }

    /// Clears the sequence counter, history, and all subscriptions. The next
    /// `publish` after `reset` yields sequence 1.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.sequence = 0;
        state.history.clear();
        state.subscriptions.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("EventBus")
            .field("sequence", &state.sequence)
            .field("history_len", &state.history.len())
            .field("subscriptions", &state.subscriptions.len())
            .finish()
    }
}
