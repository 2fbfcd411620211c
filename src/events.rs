//! Session-scoped typed publish/subscribe channel.
//!
//! The bus is created with the session and handed to every component that
//! needs it; there is no process-wide registry. Dispatch is synchronous and
//! depth-first: `publish` invokes every currently-registered subscriber for
//! the event type, in registration order, before returning. Dispatch iterates
//! a snapshot, so a handler that subscribes or unsubscribes mid-dispatch does
//! not change the in-flight delivery.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ErasedHandler = Rc<dyn Fn(&dyn Any)>;

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    handler: ErasedHandler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<TypeId, Vec<HandlerEntry>>,
}

/// Cheaply clonable handle to a shared subscriber registry.
///
/// Single-threaded by construction; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events of type `E`. Handlers for the same type
    /// run in registration order.
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: Any,
        F: Fn(&E) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        let erased: ErasedHandler = Rc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        });
        registry
            .handlers
            .entry(TypeId::of::<E>())
            .or_default()
            .push(HandlerEntry { id, handler: erased });
        id
    }

    /// Remove a previously registered handler. Returns false when the id is
    /// unknown (already removed, or never issued by this bus).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.borrow_mut();
        for entries in registry.handlers.values_mut() {
            if let Some(pos) = entries.iter().position(|entry| entry.id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    /// Synchronously deliver `event` to all subscribers of its type.
    ///
    /// The registry borrow is released before any handler runs, so handlers
    /// may publish further events or mutate the subscriber list.
    pub fn publish<E: Any>(&self, event: &E) {
        let snapshot: Vec<HandlerEntry> = {
            let registry = self.registry.borrow();
            registry
                .handlers
                .get(&TypeId::of::<E>())
                .cloned()
                .unwrap_or_default()
        };
        for entry in snapshot {
            (entry.handler)(event);
        }
    }

    /// Number of live subscriptions for event type `E`.
    #[must_use]
    pub fn subscriber_count<E: Any>(&self) -> usize {
        self.registry
            .borrow()
            .handlers
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let total: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("event_types", &registry.handlers.len())
            .field("subscriptions", &total)
            .finish()
    }
}

/// One anomaly instance reported resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyResolved {
    /// Point id when the instance is bound to a point, else the variant id.
    pub id: String,
    /// Stable per-instance identity used for duplicate rejection.
    pub source: String,
}

/// Night progress snapshot published after every accepted resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightProgress {
    pub resolved: usize,
    pub total: usize,
}

/// All active anomalies for the night have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NightCompleted;

/// Outcome of one reaction-game round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResult {
    pub success: bool,
}

/// A fatal gameplay outcome surfaced to the external game-state collaborator,
/// which owns the decision to end the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalFailure {
    pub id: String,
}
