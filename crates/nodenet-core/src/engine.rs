//! The connectivity engine: owns every node and graph record and drives the
//! incremental update loop.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`Storage`] of entities and their node, graph, poly and proxy records
//! - [`UpdateQueues`] of nodes awaiting an edge update and graphs awaiting
//!   split or merge resolution
//! - The automatic linkers registered per [`GraphProto`]
//! - An [`EventBus`] of graph notifications
//!
//! # Update Loop
//!
//! Each [`Engine::update`] repeats, until every queue is empty or
//! `max_iterations` passes have run:
//! 1. **Edges** -- recompute automatic edges of queued nodes; floodfill
//!    nodes that are still graphless afterwards
//! 2. **Splits** -- partition graphs that lost internal connectivity
//! 3. **Merges** -- absorb graphs that gained a connection into the largest
//!
//! Buffered events are delivered once the loop settles (or gives up).

use std::collections::{BTreeMap, BTreeSet};

use tracing::error;

use crate::config::EngineConfig;
use crate::event::{EventBus, EventFilter, EventKind, GraphEvent, Listener, ListenerPriority};
use crate::flags::NodeFlags;
use crate::id::{EntityId, GraphId, GraphProto};
use crate::linker::AutoLinker;
use crate::node::{EntityMeta, GraphNode, Storage};
use crate::queue::UpdateQueues;
use crate::report::UpdateReport;
use crate::spatial::SpatialContext;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("entity {0:?} does not exist")]
    EntityNotFound(EntityId),
    #[error("entity {0:?} is not backing a graph")]
    GraphNotFound(EntityId),
    #[error("entity {0:?} is already a node")]
    AlreadyNode(EntityId),
    #[error("entity {0:?} is not a node")]
    NotANode(EntityId),
    #[error("entity {0:?} is already poly-capable")]
    AlreadyPoly(EntityId),
    #[error("entity {0:?} is already a proxy")]
    AlreadyProxy(EntityId),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    pub(crate) store: Storage,
    pub(crate) queues: UpdateQueues,

    /// Extant graphs indexed by type.
    pub(crate) graphs_by_proto: BTreeMap<GraphProto, BTreeSet<GraphId>>,

    /// Automatic linkers, consulted in registration order.
    pub(crate) linkers: BTreeMap<GraphProto, Vec<Box<dyn AutoLinker>>>,

    pub event_bus: EventBus,
    pub(crate) config: EngineConfig,

    /// Number of `update` calls so far; stamped on every event.
    pub(crate) tick: u64,

    /// Counters for the update in progress.
    pub(crate) stats: UpdateReport,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut event_bus = EventBus::new(config.event_buffer_capacity);
        for kind in &config.suppressed_events {
            event_bus.suppress(*kind);
        }
        Self {
            store: Storage::new(),
            queues: UpdateQueues::new(),
            graphs_by_proto: BTreeMap::new(),
            linkers: BTreeMap::new(),
            event_bus,
            config,
            tick: 0,
            stats: UpdateReport::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only access to the raw records.
    pub fn storage(&self) -> &Storage {
        &self.store
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns `true` when no edge, split or merge work is queued.
    pub fn is_settled(&self) -> bool {
        self.queues.is_empty()
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create a bare entity. `prototype` is only used for diagnostics.
    pub fn spawn_entity(&mut self, prototype: impl Into<String>) -> EntityId {
        self.store.entities.insert(EntityMeta {
            prototype: prototype.into(),
        })
    }

    pub fn contains_entity(&self, entity: EntityId) -> bool {
        self.store.entities.contains_key(entity)
    }

    /// Give `entity` node status. Its edges and graph membership are resolved
    /// on the next update.
    pub fn add_node(&mut self, entity: EntityId, proto: impl Into<GraphProto>) -> Result<(), EngineError> {
        if !self.store.entities.contains_key(entity) {
            return Err(EngineError::EntityNotFound(entity));
        }
        if self.store.nodes.contains_key(entity) {
            return Err(EngineError::AlreadyNode(entity));
        }
        self.store.nodes.insert(entity, GraphNode::new(proto.into()));
        self.queue_edge_update(entity);
        Ok(())
    }

    /// Spawn an entity and give it node status in one step.
    pub fn spawn_node(&mut self, prototype: impl Into<String>, proto: impl Into<GraphProto>) -> EntityId {
        let entity = self.spawn_entity(prototype);
        self.store.nodes.insert(entity, GraphNode::new(proto.into()));
        self.queue_edge_update(entity);
        entity
    }

    /// Destroy an entity and everything hanging off it.
    ///
    /// - A graph's backing entity takes its member hosts down with it.
    /// - A poly entity destroys its proxies (except a self-proxy).
    /// - A proxy is detached from its poly.
    /// - A node loses every edge and leaves its graph.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EngineError> {
        if !self.store.entities.contains_key(entity) {
            return Err(EngineError::EntityNotFound(entity));
        }
        self.teardown_entity(entity);
        Ok(())
    }

    pub(crate) fn teardown_entity(&mut self, entity: EntityId) {
        if let Some(record) = self.store.graphs.get(entity) {
            let members: Vec<EntityId> = record.nodes.iter().copied().collect();
            if !members.is_empty() {
                tracing::info!(
                    graph = ?entity,
                    members = members.len(),
                    "graph destroyed administratively; destroying member hosts"
                );
                for member in members {
                    let host = self.node_host(member);
                    if host != entity && self.store.entities.contains_key(host) {
                        self.teardown_entity(host);
                    }
                }
            }
            if self.store.graphs.contains_key(entity) {
                self.del_graph(GraphId(entity));
            }
        }
        if !self.store.entities.contains_key(entity) {
            return;
        }

        if let Some(poly) = self.store.polys.remove(entity) {
            for proxy in poly.proxies.into_values() {
                if proxy == entity {
                    continue;
                }
                self.store.proxies.remove(proxy);
                if self.store.entities.contains_key(proxy) {
                    self.teardown_entity(proxy);
                }
            }
        }
        if let Some(link) = self.store.proxies.remove(entity)
            && let Some(poly) = self.store.polys.get_mut(link.poly)
            && poly.proxies.get(&link.key) == Some(&entity)
        {
            poly.proxies.remove(&link.key);
            if poly.self_key.as_ref() == Some(&link.key) {
                poly.self_key = None;
            }
        }
        if self.store.nodes.contains_key(entity) {
            self.teardown_node(entity);
        }
        self.store.entities.remove(entity);
    }

    fn teardown_node(&mut self, node: EntityId) {
        self.clear_edge_update(node);
        let peers: Vec<EntityId> = self
            .store
            .nodes
            .get(node)
            .map(|n| n.edges.iter().map(|e| e.peer).collect())
            .unwrap_or_default();
        for peer in peers {
            self.remove_edge(node, peer);
        }
        self.remove_node_from_graph(node);
        self.store.nodes.remove(node);
    }

    // -----------------------------------------------------------------------
    // Linkers
    // -----------------------------------------------------------------------

    /// Register an automatic linker for nodes of `proto`.
    pub fn register_linker(&mut self, proto: impl Into<GraphProto>, linker: Box<dyn AutoLinker>) {
        self.linkers.entry(proto.into()).or_default().push(linker);
    }

    pub fn linker_count(&self) -> usize {
        self.linkers.values().map(Vec::len).sum()
    }

    /// First registered linker of concrete type `T`.
    pub fn linker<T: AutoLinker + 'static>(&self) -> Option<&T> {
        self.linkers
            .values()
            .flatten()
            .find_map(|l| l.as_any().downcast_ref::<T>())
    }

    /// First registered linker of concrete type `T`, mutably.
    pub fn linker_mut<T: AutoLinker + 'static>(&mut self) -> Option<&mut T> {
        self.linkers
            .values_mut()
            .flatten()
            .find_map(|l| l.as_any_mut().downcast_mut::<T>())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.event_bus.emit(event);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_event(&mut self, kind: EventKind, listener: Listener) {
        self.event_bus.on(kind, listener);
    }

    pub fn on_event_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        self.event_bus.on_filtered(kind, priority, filter, listener);
    }

    /// Deliver buffered events now instead of waiting for the next update.
    pub fn deliver_events(&mut self) {
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Update loop
    // -----------------------------------------------------------------------

    /// Resolve all pending edge, split and merge work.
    pub fn update(&mut self, spatial: &dyn SpatialContext) -> UpdateReport {
        self.tick += 1;
        let span = tracing::debug_span!("nodenet_update", tick = self.tick);
        let _enter = span.enter();

        self.stats = UpdateReport {
            tick: self.tick,
            ..UpdateReport::default()
        };

        #[cfg(feature = "profiling")]
        let update_start = std::time::Instant::now();
        #[cfg(feature = "profiling")]
        let mut profile = crate::report::UpdateProfile::default();

        while !self.queues.is_empty() {
            if self.stats.iterations >= self.config.max_iterations {
                error!(
                    iterations = self.stats.iterations,
                    edge_updates = self.queues.edge_updates.len(),
                    splits = self.queues.split_graphs.len(),
                    merges = self.queues.merge_graphs.len(),
                    "node graph update exceeded the iteration cap; carrying queued work over"
                );
                self.stats.capped = true;
                break;
            }
            self.stats.iterations += 1;

            #[cfg(feature = "profiling")]
            let phase_start = std::time::Instant::now();
            self.drain_edge_queue(spatial);
            #[cfg(feature = "profiling")]
            {
                profile.edges += phase_start.elapsed();
            }

            #[cfg(feature = "profiling")]
            let phase_start = std::time::Instant::now();
            self.drain_split_queue();
            #[cfg(feature = "profiling")]
            {
                profile.splits += phase_start.elapsed();
            }

            #[cfg(feature = "profiling")]
            let phase_start = std::time::Instant::now();
            self.drain_merge_queue();
            #[cfg(feature = "profiling")]
            {
                profile.merges += phase_start.elapsed();
            }
        }

        #[cfg(feature = "profiling")]
        let phase_start = std::time::Instant::now();
        self.event_bus.deliver();
        #[cfg(feature = "profiling")]
        {
            profile.delivery = phase_start.elapsed();
            profile.total = update_start.elapsed();
            self.stats.profile = Some(profile);
        }

        std::mem::take(&mut self.stats)
    }

    fn drain_edge_queue(&mut self, spatial: &dyn SpatialContext) {
        while let Some(node) = self.queues.edge_updates.pop_first() {
            if !self.store.nodes.contains_key(node) {
                continue;
            }
            self.update_edges(node, spatial);
            self.stats.edge_updates += 1;

            let graphless = match self.store.nodes.get_mut(node) {
                Some(n) if n.graph.is_some() => {
                    n.flags |= NodeFlags::INIT;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if graphless {
                self.flood_spawn_graph(node, spatial);
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
