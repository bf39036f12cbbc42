//! Entity-directed notifications.
//!
//! Every [`Event`] is raised *on* a target entity. Raised events are queued
//! in the [`EventBus`] and delivered FIFO by the world to every registered
//! module and to passive listeners once the current handler returns.
//!
//! The one notification that must be observed synchronously, "material
//! entity about to be inserted", is not queued: it is a [`BeforeInsert`]
//! passed by `&mut` so handlers can mark it handled.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed
//! events are dropped at raise time and never reach modules or listeners.

use std::collections::VecDeque;

use crate::id::{EntityId, MaterialKind};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A notification raised on a target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Device links --
    /// A link from `source` to `sink` was created. Raised on both endpoints.
    NewLink { source: EntityId, sink: EntityId },
    /// The link from `source` to `sink` was removed. Raised on both endpoints.
    LinkRemoved { source: EntityId, sink: EntityId },

    // -- Materials --
    /// The quantity of `kind` held by the target changed.
    ///
    /// `relayed_from` is set when the notification is a re-raise of a change
    /// that happened on another entity.
    MaterialAmountChanged {
        kind: MaterialKind,
        relayed_from: Option<EntityId>,
    },
    /// A material entity was inserted into the target's ledger.
    MaterialEntityInserted {
        user: Option<EntityId>,
        item: EntityId,
    },

    // -- Entity state --
    /// The target's reported power state changed.
    PowerChanged { powered: bool },
    /// The target is about to be removed from the world.
    EntityRemoved,
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewLink,
    LinkRemoved,
    MaterialAmountChanged,
    MaterialEntityInserted,
    PowerChanged,
    EntityRemoved,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 6;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewLink { .. } => EventKind::NewLink,
            Event::LinkRemoved { .. } => EventKind::LinkRemoved,
            Event::MaterialAmountChanged { .. } => EventKind::MaterialAmountChanged,
            Event::MaterialEntityInserted { .. } => EventKind::MaterialEntityInserted,
            Event::PowerChanged { .. } => EventKind::PowerChanged,
            Event::EntityRemoved => EventKind::EntityRemoved,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Synchronous insertion notification
// ---------------------------------------------------------------------------

/// "Material entity about to be inserted" notification.
///
/// Raised on the insertion target before the default insertion runs. A
/// handler that sets `handled` takes over the insertion and the default path
/// is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeInsert {
    pub user: Option<EntityId>,
    pub item: EntityId,
    pub handled: bool,
}

impl BeforeInsert {
    pub fn new(user: Option<EntityId>, item: EntityId) -> Self {
        Self {
            user,
            item,
            handled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener observes delivered events read-only (UI refresh,
/// audio, analytics).
pub type PassiveListener = Box<dyn FnMut(EntityId, &Event)>;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Queue of raised events plus passive listeners and suppression flags.
pub struct EventBus {
    queue: VecDeque<(EntityId, Event)>,
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    /// Events raised since creation, suppressed ones excluded.
    total_raised: u64,
    /// Device links modules asked the world to remove, as (source, sink).
    unlink_requests: Vec<(EntityId, EntityId)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("queue", &self.queue)
            .field("suppressed", &self.suppressed)
            .field("total_raised", &self.total_raised)
            .field("unlink_requests", &self.unlink_requests)
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            total_raised: 0,
            unlink_requests: Vec::new(),
        }
    }

    /// Suppress an event kind. Already-queued events of that kind are dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.queue.retain(|(_, e)| e.kind() != kind);
    }

    /// Check if an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Raise `event` on `target`. No-ops if the kind is suppressed.
    pub fn raise(&mut self, target: EntityId, event: Event) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.total_raised += 1;
        self.queue.push_back((target, event));
    }

    /// Take the oldest queued event.
    pub fn pop(&mut self) -> Option<(EntityId, Event)> {
        self.queue.pop_front()
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn total_raised(&self) -> u64 {
        self.total_raised
    }

    /// Ask the world to remove the device link `source -> sink`. Applied at
    /// the next flush step, which raises the usual `LinkRemoved` events.
    pub fn request_unlink(&mut self, source: EntityId, sink: EntityId) {
        if !self.unlink_requests.contains(&(source, sink)) {
            self.unlink_requests.push((source, sink));
        }
    }

    /// Drain pending unlink requests in request order.
    pub fn take_unlink_requests(&mut self) -> Vec<(EntityId, EntityId)> {
        std::mem::take(&mut self.unlink_requests)
    }

    /// Drop every queued event without delivering it.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Register a passive listener for an event kind. Listeners are called
    /// in registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Call every passive listener registered for the event's kind.
    pub fn notify_listeners(&mut self, target: EntityId, event: &Event) {
        for listener in &mut self.listeners[event.kind().index()] {
            listener(target, event);
        }
    }
}
