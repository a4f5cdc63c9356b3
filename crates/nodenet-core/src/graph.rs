//! Graph lifecycle: spawning and deleting graph records, moving nodes
//! between them, floodfill initialisation, and split/merge resolution.
//!
//! # Invariants
//!
//! - A graph with no members is deleted as soon as it empties.
//! - Every member of a graph has the graph's proto.
//! - At rest (queues drained), each connected group of same-proto nodes
//!   joined by mergeable edges is exactly one graph.

use std::collections::BTreeSet;

use tracing::{debug, error, trace};

use crate::engine::Engine;
use crate::event::GraphEvent;
use crate::flags::{EdgeFlags, NodeFlags};
use crate::id::{EntityId, GraphId, GraphProto};
use crate::node::{EntityMeta, NodeGraph, Storage};
use crate::spatial::SpatialContext;

// ---------------------------------------------------------------------------
// Partition discovery
// ---------------------------------------------------------------------------

/// Connected groups of `graph`'s members, discovered by walking mergeable
/// edges outward from each node marked for split.
///
/// Returns an empty list when the first group already reaches every marked
/// node: the graph is still in one piece. Otherwise every marked node is in
/// exactly one returned group, in discovery order.
pub fn split_partitions(store: &Storage, graph: GraphId) -> Vec<Vec<EntityId>> {
    let Some(record) = store.graph(graph) else {
        return Vec::new();
    };
    let mut visited: BTreeSet<EntityId> = BTreeSet::new();
    let mut partitions: Vec<Vec<EntityId>> = Vec::new();

    for &seed in &record.split_nodes {
        if !record.nodes.contains(&seed) || !visited.insert(seed) {
            continue;
        }
        let mut partition = vec![seed];
        let mut next = 0;
        while next < partition.len() {
            let current = partition[next];
            next += 1;
            let Some(node) = store.nodes.get(current) else {
                continue;
            };
            for edge in &node.edges {
                if edge.flags.is_mergeable()
                    && record.nodes.contains(&edge.peer)
                    && visited.insert(edge.peer)
                {
                    partition.push(edge.peer);
                }
            }
        }

        if partitions.is_empty()
            && record
                .split_nodes
                .iter()
                .all(|n| visited.contains(n) || !record.nodes.contains(n))
        {
            return Vec::new();
        }
        partitions.push(partition);
    }
    partitions
}

/// Index of the partition kept by the original graph: the largest, the
/// first discovered on ties.
fn retained_partition(partitions: &[Vec<EntityId>]) -> usize {
    let mut keep = 0;
    for (i, partition) in partitions.iter().enumerate() {
        if partition.len() > partitions[keep].len() {
            keep = i;
        }
    }
    keep
}

impl Engine {
    // -----------------------------------------------------------------------
    // Spawning and deletion
    // -----------------------------------------------------------------------

    pub(crate) fn spawn_graph(&mut self, proto: GraphProto) -> GraphId {
        let entity = self.store.entities.insert(EntityMeta {
            prototype: format!("graph:{proto}"),
        });
        self.store.graphs.insert(entity, NodeGraph::new(proto.clone()));
        let graph = GraphId(entity);
        self.graphs_by_proto
            .entry(proto.clone())
            .or_default()
            .insert(graph);
        self.stats.graphs_spawned += 1;
        debug!(graph = ?entity, %proto, "spawned graph");

        let tick = self.tick;
        self.emit(GraphEvent::GraphSpawned { graph, proto, tick });
        graph
    }

    /// Delete a graph record and its backing entity. Members still present
    /// are rehomed into a fresh graph.
    pub(crate) fn del_graph(&mut self, graph: GraphId) {
        let Some(record) = self.store.graphs.remove(graph.entity()) else {
            return;
        };
        self.queues.forget_graph(graph);
        if let Some(graphs) = self.graphs_by_proto.get_mut(&record.proto) {
            graphs.remove(&graph);
            if graphs.is_empty() {
                self.graphs_by_proto.remove(&record.proto);
            }
        }

        if !record.nodes.is_empty() {
            error!(
                graph = ?graph.entity(),
                proto = %record.proto,
                members = record.nodes.len(),
                "deleting a graph that still has members; rehoming them"
            );
            let rehome = self.spawn_graph(record.proto.clone());
            for &node in &record.nodes {
                match self.store.nodes.get_mut(node) {
                    Some(n) if n.graph == Some(graph) => n.graph = None,
                    _ => continue,
                }
                self.add_node_to_graph(node, rehome);
            }
        }

        self.stats.graphs_deleted += 1;
        debug!(graph = ?graph.entity(), proto = %record.proto, "deleted graph");
        let tick = self.tick;
        self.emit(GraphEvent::GraphDeleted {
            graph,
            proto: record.proto,
            tick,
        });

        if self.store.entities.contains_key(graph.entity()) {
            self.teardown_entity(graph.entity());
        }
    }

    /// Administrative deletion: destroys the graph entity together with the
    /// host of every member.
    pub fn destroy_graph(&mut self, graph: GraphId) -> Result<(), crate::engine::EngineError> {
        if !self.store.graphs.contains_key(graph.entity()) {
            return Err(crate::engine::EngineError::GraphNotFound(graph.entity()));
        }
        self.teardown_entity(graph.entity());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Move `node` into `graph`, carrying pending merge/split marks along.
    pub(crate) fn add_node_to_graph(&mut self, node: EntityId, graph: GraphId) {
        let Some(n) = self.store.nodes.get(node) else {
            return;
        };
        if n.graph == Some(graph) {
            return;
        }
        let Some(record) = self.store.graph(graph) else {
            error!(node = %self.describe(node), graph = ?graph.entity(), "adding node to a missing graph");
            return;
        };
        if record.proto != n.proto {
            error!(
                node = %self.describe(node),
                graph = ?graph.entity(),
                graph_proto = %record.proto,
                "refusing to add node to a graph of another type"
            );
            return;
        }
        let carried = n.flags & (NodeFlags::MERGE | NodeFlags::SPLIT);
        if n.graph.is_some() {
            self.remove_node_from_graph(node);
        }

        if let Some(n) = self.store.nodes.get_mut(node) {
            n.graph = Some(graph);
        }
        if let Some(record) = self.store.graph_mut(graph) {
            record.nodes.insert(node);
            if carried.contains(NodeFlags::MERGE) {
                record.merge_nodes.insert(node);
                self.queues.merge_graphs.insert(graph);
            }
            if carried.contains(NodeFlags::SPLIT) {
                record.split_nodes.insert(node);
                self.queues.split_graphs.insert(graph);
            }
        }

        let tick = self.tick;
        self.emit(GraphEvent::NodeAdded { graph, node, tick });
        self.emit(GraphEvent::AddedToGraph { node, graph, tick });
    }

    /// Detach `node` from its graph, deleting the graph if it empties.
    pub(crate) fn remove_node_from_graph(&mut self, node: EntityId) {
        let Some(graph) = self.store.nodes.get_mut(node).and_then(|n| n.graph.take()) else {
            return;
        };
        let emptied = match self.store.graph_mut(graph) {
            Some(record) => {
                record.nodes.remove(&node);
                record.split_nodes.remove(&node);
                record.merge_nodes.remove(&node);
                if record.split_nodes.is_empty() {
                    self.queues.split_graphs.remove(&graph);
                }
                if record.merge_nodes.is_empty() {
                    self.queues.merge_graphs.remove(&graph);
                }
                record.nodes.is_empty()
            }
            None => false,
        };

        let tick = self.tick;
        self.emit(GraphEvent::NodeRemoved { graph, node, tick });
        self.emit(GraphEvent::RemovedFromGraph { node, graph, tick });
        if emptied {
            self.del_graph(graph);
        }
    }

    // -----------------------------------------------------------------------
    // Merge / split marks
    // -----------------------------------------------------------------------

    pub(crate) fn mark_merge(&mut self, node: EntityId) {
        let Some(n) = self.store.nodes.get_mut(node) else {
            return;
        };
        let Some(graph) = n.graph else {
            return;
        };
        n.flags |= NodeFlags::MERGE;
        if let Some(record) = self.store.graphs.get_mut(graph.entity()) {
            record.merge_nodes.insert(node);
            self.queues.merge_graphs.insert(graph);
        }
    }

    pub(crate) fn clear_merge(&mut self, node: EntityId) {
        let Some(n) = self.store.nodes.get_mut(node) else {
            return;
        };
        n.flags.remove(NodeFlags::MERGE);
        let Some(graph) = n.graph else {
            return;
        };
        if let Some(record) = self.store.graphs.get_mut(graph.entity()) {
            record.merge_nodes.remove(&node);
            if record.merge_nodes.is_empty() {
                self.queues.merge_graphs.remove(&graph);
            }
        }
    }

    pub(crate) fn mark_split(&mut self, node: EntityId) {
        let Some(n) = self.store.nodes.get_mut(node) else {
            return;
        };
        let Some(graph) = n.graph else {
            return;
        };
        n.flags |= NodeFlags::SPLIT;
        if let Some(record) = self.store.graphs.get_mut(graph.entity()) {
            record.split_nodes.insert(node);
            self.queues.split_graphs.insert(graph);
        }
    }

    pub(crate) fn clear_split(&mut self, node: EntityId) {
        let Some(n) = self.store.nodes.get_mut(node) else {
            return;
        };
        n.flags.remove(NodeFlags::SPLIT);
        let Some(graph) = n.graph else {
            return;
        };
        if let Some(record) = self.store.graphs.get_mut(graph.entity()) {
            record.split_nodes.remove(&node);
            if record.split_nodes.is_empty() {
                self.queues.split_graphs.remove(&graph);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Floodfill initialisation
    // -----------------------------------------------------------------------

    /// Gather every graphless node reachable from `seed` over mergeable
    /// same-proto edges into one graph: the largest extant graph touched
    /// along the way, or a new one.
    pub(crate) fn flood_spawn_graph(&mut self, seed: EntityId, spatial: &dyn SpatialContext) -> Option<GraphId> {
        let proto = self.store.nodes.get(seed)?.proto.clone();
        let mut visited: BTreeSet<EntityId> = BTreeSet::from([seed]);
        let mut order = vec![seed];
        let mut touched: BTreeSet<GraphId> = BTreeSet::new();
        if let Some(n) = self.store.nodes.get_mut(seed) {
            n.flags |= NodeFlags::INIT;
        }

        let mut next = 0;
        while next < order.len() {
            let current = order[next];
            next += 1;
            let peers: Vec<EntityId> = self
                .store
                .nodes
                .get(current)
                .map(|n| {
                    n.edges
                        .iter()
                        .filter(|e| e.flags.is_mergeable())
                        .map(|e| e.peer)
                        .collect()
                })
                .unwrap_or_default();

            for peer in peers {
                if visited.contains(&peer) {
                    continue;
                }
                let Some(p) = self.store.nodes.get(peer) else {
                    continue;
                };
                if p.proto != proto {
                    continue;
                }
                if !p.flags.contains(NodeFlags::INIT) {
                    self.update_edges(peer, spatial);
                    if !self
                        .store
                        .edge_flags(current, peer)
                        .is_some_and(EdgeFlags::is_mergeable)
                    {
                        // The peer dropped the edge; it still needs a flood of its own.
                        if self.store.nodes.get(peer).is_some_and(|p| p.graph.is_none()) {
                            self.queue_edge_update(peer);
                        }
                        continue;
                    }
                }
                let Some(p) = self.store.nodes.get_mut(peer) else {
                    continue;
                };
                if let Some(graph) = p.graph {
                    touched.insert(graph);
                    continue;
                }
                p.flags |= NodeFlags::INIT;
                visited.insert(peer);
                order.push(peer);
            }
        }

        let graph = match self.largest_graph(touched.iter().copied()) {
            Some(graph) => graph,
            None => self.spawn_graph(proto),
        };
        for &node in &order {
            self.add_node_to_graph(node, graph);
        }
        // Nodes that were pulled into other graphs mid-flood left edges behind.
        for &node in &order {
            if self.bridges_graphs(node) {
                self.mark_merge(node);
            }
        }
        trace!(seed = ?seed, graph = ?graph.entity(), nodes = order.len(), "floodfill");
        Some(graph)
    }

    /// The extant graph with the most members, lowest handle on ties.
    fn largest_graph(&self, graphs: impl IntoIterator<Item = GraphId>) -> Option<GraphId> {
        let mut best: Option<(GraphId, usize)> = None;
        for graph in graphs {
            let Some(record) = self.store.graph(graph) else {
                continue;
            };
            let len = record.len();
            match best {
                Some((current, best_len)) if best_len > len || (best_len == len && current < graph) => {}
                _ => best = Some((graph, len)),
            }
        }
        best.map(|(graph, _)| graph)
    }

    /// Whether `node` has a mergeable edge into a different same-proto graph.
    fn bridges_graphs(&self, node: EntityId) -> bool {
        let Some(n) = self.store.nodes.get(node) else {
            return false;
        };
        let Some(graph) = n.graph else {
            return false;
        };
        n.edges.iter().any(|e| {
            e.flags.is_mergeable()
                && self
                    .store
                    .nodes
                    .get(e.peer)
                    .is_some_and(|p| p.proto == n.proto && p.graph.is_some_and(|g| g != graph))
        })
    }

    // -----------------------------------------------------------------------
    // Split resolution
    // -----------------------------------------------------------------------

    pub(crate) fn drain_split_queue(&mut self) {
        let queued: Vec<GraphId> = std::mem::take(&mut self.queues.split_graphs)
            .into_iter()
            .collect();
        let partitions = self.discover_partitions(&queued);
        for (graph, partitions) in queued.into_iter().zip(partitions) {
            self.apply_split(graph, partitions);
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn discover_partitions(&self, graphs: &[GraphId]) -> Vec<Vec<Vec<EntityId>>> {
        graphs
            .iter()
            .map(|&graph| split_partitions(&self.store, graph))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn discover_partitions(&self, graphs: &[GraphId]) -> Vec<Vec<Vec<EntityId>>> {
        use rayon::prelude::*;
        let store = &self.store;
        graphs
            .par_iter()
            .map(|&graph| split_partitions(store, graph))
            .collect()
    }

    fn apply_split(&mut self, graph: GraphId, partitions: Vec<Vec<EntityId>>) {
        let Some(record) = self.store.graph_mut(graph) else {
            return;
        };
        let marked = std::mem::take(&mut record.split_nodes);
        for node in marked {
            if let Some(n) = self.store.nodes.get_mut(node) {
                n.flags.remove(NodeFlags::SPLIT);
            }
        }
        self.queues.split_graphs.remove(&graph);

        if partitions.len() < 2 {
            return;
        }
        let keep = retained_partition(&partitions);
        for (i, partition) in partitions.into_iter().enumerate() {
            if i != keep {
                self.split_graph(graph, partition);
            }
        }
        self.stats.splits_resolved += 1;
    }

    /// Move `nodes` out of `graph` into a freshly spawned graph.
    fn split_graph(&mut self, graph: GraphId, nodes: Vec<EntityId>) {
        let Some(proto) = self.store.graph(graph).map(|r| r.proto.clone()) else {
            return;
        };
        let split = self.spawn_graph(proto);
        let tick = self.tick;
        self.emit(GraphEvent::Splitting {
            graph: split,
            from: graph,
            tick,
        });
        self.emit(GraphEvent::SplittingFrom {
            graph,
            into: split,
            tick,
        });

        for node in nodes {
            self.add_node_to_graph(node, split);
        }
        if self.store.graph(split).is_some_and(NodeGraph::is_empty) {
            self.del_graph(split);
            return;
        }
        debug!(from = ?graph.entity(), into = ?split.entity(), "split graph");

        self.emit(GraphEvent::Split {
            graph: split,
            from: graph,
            tick,
        });
        self.emit(GraphEvent::SplitFrom {
            graph,
            into: split,
            tick,
        });
    }

    // -----------------------------------------------------------------------
    // Merge resolution
    // -----------------------------------------------------------------------

    pub(crate) fn drain_merge_queue(&mut self) {
        while let Some(graph) = self.queues.merge_graphs.pop_first() {
            if self.store.graphs.contains_key(graph.entity()) {
                self.resolve_merge(graph);
            }
        }
    }

    /// Find every graph connected to `start` through merge-marked nodes and
    /// fold them all into the largest.
    fn resolve_merge(&mut self, start: GraphId) {
        let Some(proto) = self.store.graph(start).map(|r| r.proto.clone()) else {
            return;
        };
        let mut visited: BTreeSet<GraphId> = BTreeSet::from([start]);
        let mut stack = vec![start];

        while let Some(graph) = stack.pop() {
            self.queues.merge_graphs.remove(&graph);
            let Some(record) = self.store.graph_mut(graph) else {
                continue;
            };
            let marked = std::mem::take(&mut record.merge_nodes);
            for node in marked {
                let Some(n) = self.store.nodes.get_mut(node) else {
                    continue;
                };
                n.flags.remove(NodeFlags::MERGE);
                let peers: Vec<EntityId> = n
                    .edges
                    .iter()
                    .filter(|e| e.flags.is_mergeable())
                    .map(|e| e.peer)
                    .collect();
                for peer in peers {
                    if let Some(p) = self.store.nodes.get(peer)
                        && p.proto == proto
                        && let Some(peer_graph) = p.graph
                        && visited.insert(peer_graph)
                    {
                        stack.push(peer_graph);
                    }
                }
            }
        }

        if visited.len() < 2 {
            return;
        }
        let Some(survivor) = self.largest_graph(visited.iter().copied()) else {
            return;
        };
        for graph in visited {
            if graph != survivor {
                self.merge_graphs(survivor, graph);
            }
        }
    }

    fn merge_graphs(&mut self, into: GraphId, from: GraphId) {
        let Some(nodes) = self
            .store
            .graph(from)
            .map(|r| r.nodes.iter().copied().collect::<Vec<_>>())
        else {
            return;
        };
        let tick = self.tick;
        self.emit(GraphEvent::Merging {
            graph: into,
            absorbed: from,
            tick,
        });
        self.emit(GraphEvent::MergingInto {
            graph: from,
            survivor: into,
            tick,
        });
        debug!(into = ?into.entity(), from = ?from.entity(), nodes = nodes.len(), "merging graphs");

        for node in nodes {
            self.add_node_to_graph(node, into);
        }
        self.stats.merges_resolved += 1;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::NoSpatial;
    use crate::test_utils::*;

    // -----------------------------------------------------------------------
    // Test 1: Partition discovery
    // -----------------------------------------------------------------------
    #[test]
    fn partitions_empty_when_still_connected() {
        let mut engine = engine_with_table("pipe");
        let [a, b, c] = spawn_pipes(&mut engine);
        let t = table(&mut engine);
        t.link(a, b);
        t.link(b, c);
        t.link(a, c);
        engine.update(&NoSpatial);
        let graph = engine.node_graph(a).unwrap();

        // Cutting one side of a triangle keeps it connected.
        engine.try_set_edge(a, b, EdgeFlags::NO_MERGE);
        assert!(engine.queues.split_graphs.contains(&graph));
        assert!(split_partitions(engine.storage(), graph).is_empty());
    }

    #[test]
    fn partitions_cover_every_marked_node() {
        let mut engine = engine_with_table("pipe");
        let [a, b, c, d] = spawn_pipes(&mut engine);
        chain(&mut engine, &[a, b, c, d]);
        engine.update(&NoSpatial);
        let graph = engine.node_graph(a).unwrap();

        engine.try_set_edge(b, c, EdgeFlags::NO_MERGE);
        let partitions = split_partitions(engine.storage(), graph);
        assert_eq!(partitions.len(), 2);
        let mut all: Vec<EntityId> = partitions.concat();
        all.sort();
        let mut expected = vec![a, b, c, d];
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn retained_partition_prefers_largest_then_first() {
        let v = spawn_ids(4);
        assert_eq!(retained_partition(&[vec![v[0]], vec![v[1], v[2]]]), 1);
        assert_eq!(retained_partition(&[vec![v[0], v[3]], vec![v[1], v[2]]]), 0);
    }

    // -----------------------------------------------------------------------
    // Test 2: Floodfill
    // -----------------------------------------------------------------------
    #[test]
    fn flood_joins_existing_graph() {
        let mut engine = engine_with_table("pipe");
        let [a, b] = spawn_pipes(&mut engine);
        table(&mut engine).link(a, b);
        engine.update(&NoSpatial);
        let graph = engine.node_graph(a).unwrap();

        let [c] = spawn_pipes(&mut engine);
        table(&mut engine).link(b, c);
        engine.update(&NoSpatial);

        assert_eq!(engine.node_graph(c), Some(graph));
        assert_eq!(engine.graph_count(), 1);
    }

    #[test]
    fn flood_does_not_cross_types() {
        let mut engine = engine_with_table("pipe");
        register_table(&mut engine, "cable");
        let [a] = spawn_pipes(&mut engine);
        let cable = engine.spawn_node("cable_segment", "cable");
        engine.try_add_edge(a, cable, EdgeFlags::empty());
        engine.update(&NoSpatial);

        assert_ne!(engine.node_graph(a), engine.node_graph(cable));
        assert!(engine.node_graph(cable).is_some());
        assert_eq!(engine.graph_count(), 2);
    }

    #[test]
    fn no_merge_edges_do_not_flood() {
        let mut engine = engine_with_table("pipe");
        let [a, b] = spawn_pipes(&mut engine);
        table(&mut engine).want(a, b, EdgeFlags::NO_MERGE);
        table(&mut engine).want(b, a, EdgeFlags::NO_MERGE);
        engine.update(&NoSpatial);

        assert!(engine.has_edge(a, b));
        assert_ne!(engine.node_graph(a), engine.node_graph(b));
    }

    // -----------------------------------------------------------------------
    // Test 3: Deletion
    // -----------------------------------------------------------------------
    #[test]
    fn deleting_populated_graph_rehomes_members() {
        let mut engine = engine_with_table("pipe");
        let [a, b] = spawn_pipes(&mut engine);
        table(&mut engine).link(a, b);
        engine.update(&NoSpatial);
        let graph = engine.node_graph(a).unwrap();

        engine.del_graph(graph);

        let rehome = engine.node_graph(a).unwrap();
        assert_ne!(rehome, graph);
        assert_eq!(engine.node_graph(b), Some(rehome));
        assert_eq!(engine.graph_count(), 1);
        assert!(!engine.contains_entity(graph.entity()));
    }

    #[test]
    fn destroy_graph_destroys_member_hosts() {
        let mut engine = engine_with_table("pipe");
        let [a, b, c] = spawn_pipes(&mut engine);
        chain(&mut engine, &[a, b, c]);
        engine.update(&NoSpatial);
        let graph = engine.node_graph(a).unwrap();

        engine.destroy_graph(graph).unwrap();

        for e in [a, b, c] {
            assert!(!engine.contains_entity(e));
        }
        assert_eq!(engine.graph_count(), 0);
        assert!(engine.destroy_graph(graph).is_err());
    }

    #[test]
    fn cross_type_add_is_refused() {
        let mut engine = Engine::new();
        let [a] = spawn_pipes(&mut engine);
        let cable = engine.spawn_node("cable_segment", "cable");
        engine.update(&NoSpatial);
        let cable_graph = engine.node_graph(cable).unwrap();
        let pipe_graph = engine.node_graph(a).unwrap();

        engine.add_node_to_graph(a, cable_graph);

        assert_eq!(engine.node_graph(a), Some(pipe_graph));
    }
}
