//! Edge maintenance: manual pins, automatic recomputation, and the
//! bookkeeping that turns a change in an edge's mergeability into merge or
//! split work.
//!
//! Both halves of an edge are kept in sync. The half stored on the peer
//! always carries the inverse flags (see [`EdgeFlags::invert`]).

use std::collections::BTreeMap;

use tracing::error;

use crate::engine::Engine;
use crate::event::GraphEvent;
use crate::flags::{EdgeFlags, NodeFlags};
use crate::id::{EntityId, GraphProto};
use crate::linker::{AutoLinker, LinkContext};
use crate::node::Edge;
use crate::spatial::SpatialContext;

/// One step of an automatic edge recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeChange {
    Set(EntityId, EdgeFlags),
    Remove(EntityId),
}

impl Engine {
    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn has_edge(&self, node: EntityId, peer: EntityId) -> bool {
        self.store.edge_flags(node, peer).is_some()
    }

    /// Flags of the half-edge `node -> peer`.
    pub fn edge_flags(&self, node: EntityId, peer: EntityId) -> Option<EdgeFlags> {
        self.store.edge_flags(node, peer)
    }

    // -----------------------------------------------------------------------
    // Edge update queue
    // -----------------------------------------------------------------------

    /// Queue `node` for an automatic edge recomputation. Idempotent.
    pub fn queue_edge_update(&mut self, node: EntityId) {
        let Some(n) = self.store.nodes.get_mut(node) else {
            return;
        };
        n.flags |= NodeFlags::EDGES;
        self.queues.edge_updates.insert(node);
    }

    pub fn clear_edge_update(&mut self, node: EntityId) {
        if let Some(n) = self.store.nodes.get_mut(node) {
            n.flags.remove(NodeFlags::EDGES);
        }
        self.queues.edge_updates.remove(&node);
    }

    // -----------------------------------------------------------------------
    // Manual edges
    // -----------------------------------------------------------------------

    fn is_edge_pair(&self, node: EntityId, peer: EntityId) -> bool {
        node != peer && self.store.nodes.contains_key(node) && self.store.nodes.contains_key(peer)
    }

    /// Pin a manual edge. Fails if a manual edge already exists; an automatic
    /// edge is taken over (keeping its provenance bits).
    pub fn try_add_edge(&mut self, node: EntityId, peer: EntityId, flags: EdgeFlags) -> bool {
        if !self.is_edge_pair(node, peer) {
            return false;
        }
        let old = self.store.edge_flags(node, peer);
        if old.is_some_and(|f| f.contains(EdgeFlags::MANUAL)) {
            return false;
        }
        let provenance = old.map_or(EdgeFlags::empty(), |f| f & EdgeFlags::SOURCE_MASK);
        self.set_edge(node, peer, flags | EdgeFlags::MANUAL | provenance);
        true
    }

    /// Unpin a manual edge. An edge the linkers also want is relaxed back to
    /// automatic and re-checked on the next update; otherwise it is removed.
    pub fn try_remove_edge(&mut self, node: EntityId, peer: EntityId) -> bool {
        let Some(old) = self.store.edge_flags(node, peer) else {
            return false;
        };
        if !old.contains(EdgeFlags::MANUAL) {
            return false;
        }
        if old.contains(EdgeFlags::AUTO) {
            self.set_edge(node, peer, old - EdgeFlags::MANUAL);
            self.queue_edge_update(node);
        } else {
            self.remove_edge(node, peer);
        }
        true
    }

    /// Create or overwrite a manual edge. Re-setting the non-provenance flags
    /// a manual edge already has is a no-op.
    pub fn try_set_edge(&mut self, node: EntityId, peer: EntityId, flags: EdgeFlags) -> bool {
        if !self.is_edge_pair(node, peer) {
            return false;
        }
        let old = self.store.edge_flags(node, peer);
        if let Some(old) = old
            && old.contains(EdgeFlags::MANUAL)
            && (old ^ flags).difference(EdgeFlags::SOURCE_MASK).is_empty()
        {
            return true;
        }
        let provenance = old.map_or(EdgeFlags::empty(), |f| f & EdgeFlags::SOURCE_MASK);
        self.set_edge(node, peer, flags | EdgeFlags::MANUAL | provenance);
        true
    }

    // -----------------------------------------------------------------------
    // Raw edge mutation
    // -----------------------------------------------------------------------

    pub(crate) fn add_edge(&mut self, node: EntityId, peer: EntityId, flags: EdgeFlags) {
        if !self.is_edge_pair(node, peer) || self.has_edge(node, peer) {
            return;
        }
        let inverse = flags.invert();
        if let Some(n) = self.store.nodes.get_mut(node) {
            n.edges.push(Edge { peer, flags });
        }
        if let Some(p) = self.store.nodes.get_mut(peer) {
            p.edges.push(Edge {
                peer: node,
                flags: inverse,
            });
        }

        let tick = self.tick;
        self.emit(GraphEvent::EdgeAdded {
            node,
            peer,
            flags,
            tick,
        });
        self.emit(GraphEvent::EdgeAdded {
            node: peer,
            peer: node,
            flags: inverse,
            tick,
        });
        self.on_half_edge_changed(node, peer, EdgeFlags::NULL, flags);
        self.on_half_edge_changed(peer, node, EdgeFlags::NULL, inverse);
    }

    pub(crate) fn remove_edge(&mut self, node: EntityId, peer: EntityId) {
        let Some(flags) = self.take_half_edge(node, peer) else {
            return;
        };
        let inverse = self
            .take_half_edge(peer, node)
            .unwrap_or_else(|| flags.invert());

        let tick = self.tick;
        self.emit(GraphEvent::EdgeRemoved {
            node,
            peer,
            flags,
            tick,
        });
        self.emit(GraphEvent::EdgeRemoved {
            node: peer,
            peer: node,
            flags: inverse,
            tick,
        });
        self.on_half_edge_changed(node, peer, flags, EdgeFlags::NULL);
        self.on_half_edge_changed(peer, node, inverse, EdgeFlags::NULL);
    }

    fn take_half_edge(&mut self, node: EntityId, peer: EntityId) -> Option<EdgeFlags> {
        let n = self.store.nodes.get_mut(node)?;
        let idx = n.edge_index(peer)?;
        Some(n.edges.swap_remove(idx).flags)
    }

    /// Add the edge if missing, otherwise change its flags.
    pub(crate) fn set_edge(&mut self, node: EntityId, peer: EntityId, flags: EdgeFlags) {
        let Some(old) = self.store.edge_flags(node, peer) else {
            self.add_edge(node, peer, flags);
            return;
        };
        if old == flags {
            return;
        }
        let inverse = flags.invert();
        let old_inverse = self.store.edge_flags(peer, node).unwrap_or_else(|| old.invert());
        if let Some(n) = self.store.nodes.get_mut(node)
            && let Some(idx) = n.edge_index(peer)
        {
            n.edges[idx].flags = flags;
        }
        if let Some(p) = self.store.nodes.get_mut(peer)
            && let Some(idx) = p.edge_index(node)
        {
            p.edges[idx].flags = inverse;
        }

        let tick = self.tick;
        self.emit(GraphEvent::EdgeChanged {
            node,
            peer,
            old,
            new: flags,
            tick,
        });
        self.emit(GraphEvent::EdgeChanged {
            node: peer,
            peer: node,
            old: old_inverse,
            new: inverse,
            tick,
        });
        self.on_half_edge_changed(node, peer, old, flags);
        self.on_half_edge_changed(peer, node, old_inverse, inverse);
    }

    /// React to a half-edge of `node` changing from `old` to `new`. Only a
    /// change in `NO_MERGE` matters for connectivity.
    fn on_half_edge_changed(&mut self, node: EntityId, peer: EntityId, old: EdgeFlags, new: EdgeFlags) {
        if !(old ^ new).contains(EdgeFlags::NO_MERGE) {
            return;
        }
        let Some(n) = self.store.nodes.get(node) else {
            return;
        };
        let graph = n.graph;
        let peer_state = self
            .store
            .nodes
            .get(peer)
            .map(|p| (p.graph, p.proto == n.proto));

        if new.contains(EdgeFlags::NO_MERGE) {
            let remaining = match self.store.nodes.get_mut(node) {
                Some(n) => {
                    n.mergeable_edges = n.mergeable_edges.saturating_sub(1);
                    n.mergeable_edges
                }
                None => return,
            };
            if remaining == 0 {
                self.clear_merge(node);
            }
            if graph.is_some() && peer_state.is_some_and(|(peer_graph, _)| peer_graph == graph) {
                self.mark_split(node);
            }
            return;
        }

        let (count, flags) = match self.store.nodes.get_mut(node) {
            Some(n) => {
                n.mergeable_edges += 1;
                (n.mergeable_edges, n.flags)
            }
            None => return,
        };
        let Some((Some(peer_graph), true)) = peer_state else {
            return;
        };
        if graph == Some(peer_graph) {
            return;
        }
        if count == 1 {
            // First connection: nothing else can be holding the node where it is.
            if flags.contains(NodeFlags::SPLIT) {
                self.clear_split(node);
            }
            self.add_node_to_graph(node, peer_graph);
        } else {
            self.mark_merge(node);
        }
    }

    // -----------------------------------------------------------------------
    // Automatic recomputation
    // -----------------------------------------------------------------------

    /// Recompute the automatic edges of `node` from the registered linkers.
    pub(crate) fn update_edges(&mut self, node: EntityId, spatial: &dyn SpatialContext) {
        self.clear_edge_update(node);
        let linkers = std::mem::take(&mut self.linkers);
        let plan = self.plan_edges(&linkers, node, spatial);
        self.linkers = linkers;

        for change in plan {
            match change {
                EdgeChange::Set(peer, flags) => self.set_edge(node, peer, flags),
                EdgeChange::Remove(peer) => self.remove_edge(node, peer),
            }
        }
    }

    fn plan_edges(
        &self,
        linkers: &BTreeMap<GraphProto, Vec<Box<dyn AutoLinker>>>,
        node: EntityId,
        spatial: &dyn SpatialContext,
    ) -> Vec<EdgeChange> {
        let Some(n) = self.store.nodes.get(node) else {
            return Vec::new();
        };
        let ctx = LinkContext::new(self, spatial);

        let mut wanted: BTreeMap<EntityId, EdgeFlags> = BTreeMap::new();
        for linker in linkers.get(&n.proto).into_iter().flatten() {
            for (peer, flags) in linker.want_edges(&ctx, node) {
                if peer == node {
                    error!(
                        node = %self.describe(node),
                        linker = linker.name(),
                        "linker proposed an edge from a node to itself"
                    );
                    continue;
                }
                if !self.store.nodes.contains_key(peer) {
                    error!(
                        node = %self.describe(node),
                        peer = %self.describe(peer),
                        linker = linker.name(),
                        "linker proposed an edge to a non-node"
                    );
                    continue;
                }
                *wanted.entry(peer).or_default() |= flags;
            }
        }

        let mut plan = Vec::new();
        for edge in &n.edges {
            let mut flags = EdgeFlags::empty();
            if let Some(out) = wanted.remove(&edge.peer) {
                flags |= out | EdgeFlags::AUTO | EdgeFlags::OUT;
            }
            if let Some(accepted) = self.peer_accepts(linkers, &ctx, edge.peer, node, Some(edge.flags.invert())) {
                flags |= accepted | EdgeFlags::AUTO | EdgeFlags::IN;
            }

            if edge.flags.contains(EdgeFlags::MANUAL) {
                flags = (edge.flags - EdgeFlags::AUTO) | (flags & EdgeFlags::AUTO);
            } else if !flags.contains(EdgeFlags::AUTO) {
                plan.push(EdgeChange::Remove(edge.peer));
                continue;
            }
            if flags != edge.flags {
                plan.push(EdgeChange::Set(edge.peer, flags));
            }
        }

        for (peer, out) in wanted {
            let mut flags = out | EdgeFlags::AUTO | EdgeFlags::OUT;
            if let Some(accepted) = self.peer_accepts(linkers, &ctx, peer, node, None) {
                flags |= accepted | EdgeFlags::IN;
            }
            plan.push(EdgeChange::Set(peer, flags));
        }
        plan
    }

    /// Ask the linkers of `peer`'s proto whether `peer` wants an edge to
    /// `node`. Returned flags are from `node`'s point of view.
    fn peer_accepts(
        &self,
        linkers: &BTreeMap<GraphProto, Vec<Box<dyn AutoLinker>>>,
        ctx: &LinkContext<'_>,
        peer: EntityId,
        node: EntityId,
        old: Option<EdgeFlags>,
    ) -> Option<EdgeFlags> {
        let proto = &self.store.nodes.get(peer)?.proto;
        linkers
            .get(proto)
            .into_iter()
            .flatten()
            .filter_map(|linker| linker.check_edge(ctx, peer, node, old))
            .reduce(|a, b| a | b)
            .map(EdgeFlags::invert)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
