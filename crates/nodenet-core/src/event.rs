//! Graph notifications.
//!
//! Events are emitted while the engine mutates edges and graphs and are
//! delivered in batch at the end of [`Engine::update`](crate::engine::Engine::update)
//! (or on demand via [`Engine::deliver_events`](crate::engine::Engine::deliver_events)).
//! Pending events sit in one queue in emission order, so a listener sees a
//! merge before the membership changes it caused, and none are dropped.
//!
//! Every event names the entity or graph it is addressed to as its first
//! field. Edge events are fired once per endpoint; membership and
//! merge/split events come in graph-side/node-side (or survivor/absorbed)
//! pairs.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which stops
//! that kind from being recorded or counted.

use crate::flags::EdgeFlags;
use crate::id::{EntityId, GraphId, GraphProto};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A graph notification. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    // -- Edges (one per endpoint) --
    EdgeAdded {
        node: EntityId,
        peer: EntityId,
        flags: EdgeFlags,
        tick: u64,
    },
    EdgeRemoved {
        node: EntityId,
        peer: EntityId,
        flags: EdgeFlags,
        tick: u64,
    },
    EdgeChanged {
        node: EntityId,
        peer: EntityId,
        old: EdgeFlags,
        new: EdgeFlags,
        tick: u64,
    },

    // -- Membership --
    NodeAdded {
        graph: GraphId,
        node: EntityId,
        tick: u64,
    },
    AddedToGraph {
        node: EntityId,
        graph: GraphId,
        tick: u64,
    },
    NodeRemoved {
        graph: GraphId,
        node: EntityId,
        tick: u64,
    },
    RemovedFromGraph {
        node: EntityId,
        graph: GraphId,
        tick: u64,
    },

    // -- Merge (before transfer) --
    Merging {
        graph: GraphId,
        absorbed: GraphId,
        tick: u64,
    },
    MergingInto {
        graph: GraphId,
        survivor: GraphId,
        tick: u64,
    },

    // -- Split (before and after transfer) --
    Splitting {
        graph: GraphId,
        from: GraphId,
        tick: u64,
    },
    SplittingFrom {
        graph: GraphId,
        into: GraphId,
        tick: u64,
    },
    Split {
        graph: GraphId,
        from: GraphId,
        tick: u64,
    },
    SplitFrom {
        graph: GraphId,
        into: GraphId,
        tick: u64,
    },

    // -- Lifecycle --
    GraphSpawned {
        graph: GraphId,
        proto: GraphProto,
        tick: u64,
    },
    GraphDeleted {
        graph: GraphId,
        proto: GraphProto,
        tick: u64,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    EdgeAdded,
    EdgeRemoved,
    EdgeChanged,
    NodeAdded,
    AddedToGraph,
    NodeRemoved,
    RemovedFromGraph,
    Merging,
    MergingInto,
    Splitting,
    SplittingFrom,
    Split,
    SplitFrom,
    GraphSpawned,
    GraphDeleted,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 15;

impl GraphEvent {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::EdgeAdded { .. } => EventKind::EdgeAdded,
            GraphEvent::EdgeRemoved { .. } => EventKind::EdgeRemoved,
            GraphEvent::EdgeChanged { .. } => EventKind::EdgeChanged,
            GraphEvent::NodeAdded { .. } => EventKind::NodeAdded,
            GraphEvent::AddedToGraph { .. } => EventKind::AddedToGraph,
            GraphEvent::NodeRemoved { .. } => EventKind::NodeRemoved,
            GraphEvent::RemovedFromGraph { .. } => EventKind::RemovedFromGraph,
            GraphEvent::Merging { .. } => EventKind::Merging,
            GraphEvent::MergingInto { .. } => EventKind::MergingInto,
            GraphEvent::Splitting { .. } => EventKind::Splitting,
            GraphEvent::SplittingFrom { .. } => EventKind::SplittingFrom,
            GraphEvent::Split { .. } => EventKind::Split,
            GraphEvent::SplitFrom { .. } => EventKind::SplitFrom,
            GraphEvent::GraphSpawned { .. } => EventKind::GraphSpawned,
            GraphEvent::GraphDeleted { .. } => EventKind::GraphDeleted,
        }
    }

    /// The entity this event is addressed to. For graph-side events this is
    /// the graph's backing entity.
    pub fn target(&self) -> EntityId {
        match self {
            GraphEvent::EdgeAdded { node, .. }
            | GraphEvent::EdgeRemoved { node, .. }
            | GraphEvent::EdgeChanged { node, .. }
            | GraphEvent::AddedToGraph { node, .. }
            | GraphEvent::RemovedFromGraph { node, .. } => *node,
            GraphEvent::NodeAdded { graph, .. }
            | GraphEvent::NodeRemoved { graph, .. }
            | GraphEvent::Merging { graph, .. }
            | GraphEvent::MergingInto { graph, .. }
            | GraphEvent::Splitting { graph, .. }
            | GraphEvent::SplittingFrom { graph, .. }
            | GraphEvent::Split { graph, .. }
            | GraphEvent::SplitFrom { graph, .. }
            | GraphEvent::GraphSpawned { graph, .. }
            | GraphEvent::GraphDeleted { graph, .. } => graph.entity(),
        }
    }
}

impl EventKind {
    /// Every kind, in discriminant order.
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::EdgeAdded,
        EventKind::EdgeRemoved,
        EventKind::EdgeChanged,
        EventKind::NodeAdded,
        EventKind::AddedToGraph,
        EventKind::NodeRemoved,
        EventKind::RemovedFromGraph,
        EventKind::Merging,
        EventKind::MergingInto,
        EventKind::Splitting,
        EventKind::SplittingFrom,
        EventKind::Split,
        EventKind::SplitFrom,
        EventKind::GraphSpawned,
        EventKind::GraphDeleted,
    ];

    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type Listener = Box<dyn FnMut(&GraphEvent)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&GraphEvent) -> bool>;

/// Priority level for listeners. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct ListenerEntry {
    listener: Listener,
    priority: ListenerPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Holds the pending events in emission order, per-kind listener lists,
/// suppression flags and emission counters.
pub struct EventBus {
    pending: Vec<GraphEvent>,
    suppressed: [bool; EVENT_KIND_COUNT],
    emitted: [u64; EVENT_KIND_COUNT],
    /// Kept sorted by `(priority, insertion_order)`.
    listeners: [Vec<ListenerEntry>; EVENT_KIND_COUNT],
    /// Monotonically increasing counter for stable sort ordering.
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("suppressed", &self.suppressed)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create an event bus with room for `initial_capacity` pending events.
    /// The queue grows past that; nothing is dropped.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(initial_capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            emitted: [0; EVENT_KIND_COUNT],
            listeners: std::array::from_fn(|_| Vec::new()),
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind. Pending events of that kind are discarded and
    /// later ones are never recorded.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.pending.retain(|event| event.kind() != kind);
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. No-ops if the event kind is suppressed.
    pub fn emit(&mut self, event: GraphEvent) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        self.emitted[idx] += 1;
        self.pending.push(event);
    }

    /// Register a listener for an event kind with Normal priority and no filter.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.on_filtered(kind, ListenerPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let listeners = &mut self.listeners[kind.index()];
        let at = listeners.partition_point(|entry| entry.priority <= priority);
        listeners.insert(
            at,
            ListenerEntry {
                listener,
                priority,
                filter,
                insertion_order: order,
            },
        );
    }

    /// Deliver pending events in the order they were emitted, then clear
    /// the queue. For each event the listeners of its kind run in
    /// `(priority, insertion_order)` order.
    pub fn deliver(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for entry in self.listeners[event.kind().index()].iter_mut() {
                if let Some(ref filter) = entry.filter
                    && !filter(event)
                {
                    continue;
                }
                (entry.listener)(event);
            }
        }
        // Hand the allocation back for the next batch.
        self.pending = events;
        self.pending.clear();
    }

    /// Events waiting for delivery, oldest first.
    pub fn pending(&self) -> &[GraphEvent] {
        &self.pending
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.pending.iter().filter(|event| event.kind() == kind).count()
    }

    /// Total events ever emitted for a kind, delivered or not.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.emitted[kind.index()]
    }

    /// Drop pending events. Does not remove listeners or suppression settings.
    pub fn clear_all(&mut self) {
        self.pending.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ids(count: usize) -> Vec<EntityId> {
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        (0..count).map(|_| sm.insert(())).collect()
    }

    fn spawned(graph: EntityId, tick: u64) -> GraphEvent {
        GraphEvent::GraphSpawned {
            graph: GraphId(graph),
            proto: GraphProto::from("pipe"),
            tick,
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Pending queue keeps every event in emission order
    // -----------------------------------------------------------------------
    #[test]
    fn pending_queue_never_drops() {
        let e = ids(1)[0];
        let mut bus = EventBus::new(2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.on(
            EventKind::GraphSpawned,
            Box::new(move |ev| {
                if let GraphEvent::GraphSpawned { tick, .. } = ev {
                    s.borrow_mut().push(*tick);
                }
            }),
        );

        for tick in 0..5 {
            bus.emit(spawned(e, tick));
        }
        assert_eq!(bus.buffered_count(EventKind::GraphSpawned), 5);
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);
        assert_eq!(bus.total_emitted(EventKind::GraphSpawned), 5);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn delivery_interleaves_kinds_chronologically() {
        let v = ids(2);
        let mut bus = EventBus::new(8);
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::GraphSpawned, EventKind::MergingInto] {
            let l = log.clone();
            bus.on(kind, Box::new(move |ev| l.borrow_mut().push(ev.kind())));
        }

        bus.emit(GraphEvent::MergingInto {
            graph: GraphId(v[1]),
            survivor: GraphId(v[0]),
            tick: 0,
        });
        bus.emit(spawned(v[0], 0));
        bus.emit(GraphEvent::MergingInto {
            graph: GraphId(v[0]),
            survivor: GraphId(v[1]),
            tick: 0,
        });
        bus.deliver();

        assert_eq!(
            *log.borrow(),
            vec![EventKind::MergingInto, EventKind::GraphSpawned, EventKind::MergingInto]
        );
    }

    // -----------------------------------------------------------------------
    // Test 2: Kinds and targets
    // -----------------------------------------------------------------------
    #[test]
    fn kind_and_target() {
        let v = ids(2);
        let edge = GraphEvent::EdgeAdded {
            node: v[0],
            peer: v[1],
            flags: EdgeFlags::AUTO,
            tick: 0,
        };
        assert_eq!(edge.kind(), EventKind::EdgeAdded);
        assert_eq!(edge.target(), v[0]);

        let merging = GraphEvent::MergingInto {
            graph: GraphId(v[1]),
            survivor: GraphId(v[0]),
            tick: 0,
        };
        assert_eq!(merging.kind(), EventKind::MergingInto);
        assert_eq!(merging.target(), v[1]);
    }

    #[test]
    fn all_kinds_index_in_order() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    // -----------------------------------------------------------------------
    // Test 3: Suppression
    // -----------------------------------------------------------------------
    #[test]
    fn suppressed_kind_is_never_buffered() {
        let e = ids(1)[0];
        let mut bus = EventBus::new(8);
        bus.suppress(EventKind::GraphSpawned);
        bus.emit(spawned(e, 0));
        assert!(bus.is_suppressed(EventKind::GraphSpawned));
        assert_eq!(bus.buffered_count(EventKind::GraphSpawned), 0);
        assert_eq!(bus.total_emitted(EventKind::GraphSpawned), 0);
        assert!(bus.pending().is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 4: Delivery order, priority, filters
    // -----------------------------------------------------------------------
    #[test]
    fn delivery_respects_priority_then_registration() {
        let e = ids(1)[0];
        let mut bus = EventBus::new(8);
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        bus.on_filtered(
            EventKind::GraphSpawned,
            ListenerPriority::Post,
            None,
            Box::new(move |_| l.borrow_mut().push("post")),
        );
        let l = log.clone();
        bus.on(EventKind::GraphSpawned, Box::new(move |_| l.borrow_mut().push("normal")));
        let l = log.clone();
        bus.on_filtered(
            EventKind::GraphSpawned,
            ListenerPriority::Pre,
            None,
            Box::new(move |_| l.borrow_mut().push("pre")),
        );

        bus.emit(spawned(e, 0));
        bus.deliver();

        assert_eq!(*log.borrow(), vec!["pre", "normal", "post"]);
        assert_eq!(bus.buffered_count(EventKind::GraphSpawned), 0);
        assert_eq!(bus.total_emitted(EventKind::GraphSpawned), 1);
    }

    #[test]
    fn filter_skips_events() {
        let e = ids(1)[0];
        let mut bus = EventBus::new(8);
        let seen = Rc::new(RefCell::new(0u32));
        let s = seen.clone();
        bus.on_filtered(
            EventKind::GraphSpawned,
            ListenerPriority::Normal,
            Some(Box::new(|ev| matches!(ev, GraphEvent::GraphSpawned { tick, .. } if *tick > 1))),
            Box::new(move |_| *s.borrow_mut() += 1),
        );
        for tick in 0..4 {
            bus.emit(spawned(e, tick));
        }
        bus.deliver();
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn clear_all_keeps_listeners() {
        let e = ids(1)[0];
        let mut bus = EventBus::new(8);
        let seen = Rc::new(RefCell::new(0u32));
        let s = seen.clone();
        bus.on(EventKind::GraphSpawned, Box::new(move |_| *s.borrow_mut() += 1));

        bus.emit(spawned(e, 0));
        bus.clear_all();
        bus.deliver();
        assert_eq!(*seen.borrow(), 0);

        bus.emit(spawned(e, 1));
        bus.deliver();
        assert_eq!(*seen.borrow(), 1);
    }
}
