//! Read-only lookups over nodes, graphs and their hosts.

use std::collections::BTreeSet;

use crate::engine::Engine;
use crate::id::{EntityId, GraphId, GraphProto};
use crate::node::Edge;
use crate::report::DiagnosticInfo;
use crate::spatial::{Direction, GridId, SpatialContext, TilePos};

impl Engine {
    // -----------------------------------------------------------------------
    // Graphs
    // -----------------------------------------------------------------------

    /// Extant graphs of one type, in handle order.
    pub fn graphs_of_proto(&self, proto: &GraphProto) -> Vec<GraphId> {
        self.graphs_by_proto
            .get(proto)
            .map(|graphs| graphs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every extant graph, in handle order.
    pub fn graphs(&self) -> Vec<GraphId> {
        self.store.graphs.keys().map(GraphId).collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub fn graph_count(&self) -> usize {
        self.store.graphs.len()
    }

    pub fn graph_nodes(&self, graph: GraphId) -> Option<&BTreeSet<EntityId>> {
        self.store.graph(graph).map(|r| &r.nodes)
    }

    pub fn graph_proto(&self, graph: GraphId) -> Option<&GraphProto> {
        self.store.graph(graph).map(|r| &r.proto)
    }

    /// Leaf members of `graph`. A member that is itself the backing entity of
    /// a graph is replaced by that graph's leaves.
    pub fn graph_leaves(&self, graph: GraphId) -> Vec<EntityId> {
        let mut leaves = Vec::new();
        let mut seen = BTreeSet::new();
        self.collect_leaves(graph, &mut seen, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, graph: GraphId, seen: &mut BTreeSet<GraphId>, leaves: &mut Vec<EntityId>) {
        if !seen.insert(graph) {
            return;
        }
        let Some(record) = self.store.graph(graph) else {
            return;
        };
        for &member in &record.nodes {
            if self.store.graphs.contains_key(member) {
                self.collect_leaves(GraphId(member), seen, leaves);
            } else {
                leaves.push(member);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn is_node(&self, entity: EntityId) -> bool {
        self.store.nodes.contains_key(entity)
    }

    pub fn node_count(&self) -> usize {
        self.store.nodes.len()
    }

    pub fn node_graph(&self, node: EntityId) -> Option<GraphId> {
        self.store.nodes.get(node)?.graph
    }

    pub fn node_proto(&self, node: EntityId) -> Option<&GraphProto> {
        self.store.nodes.get(node).map(|n| &n.proto)
    }

    /// Half-edges stored on `node`; empty for non-nodes.
    pub fn edges(&self, node: EntityId) -> &[Edge] {
        self.store.nodes.get(node).map(|n| n.edges.as_slice()).unwrap_or_default()
    }

    /// `entity`'s own node (if it is one) followed by every proxy node of a
    /// poly entity. A self-proxy is not repeated.
    pub fn entity_nodes(&self, entity: EntityId) -> Vec<EntityId> {
        let mut nodes = Vec::new();
        if self.store.nodes.contains_key(entity) {
            nodes.push(entity);
        }
        if let Some(poly) = self.store.polys.get(entity) {
            nodes.extend(
                poly.proxies
                    .values()
                    .copied()
                    .filter(|&proxy| proxy != entity && self.store.nodes.contains_key(proxy)),
            );
        }
        nodes
    }

    /// Distinct graphs of [`Engine::entity_nodes`], in handle order.
    pub fn entity_graphs(&self, entity: EntityId) -> Vec<GraphId> {
        self.entity_nodes(entity)
            .into_iter()
            .filter_map(|node| self.node_graph(node))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Nodes (proxies included) hosted by entities anchored on `tile`. With
    /// `facing`, only hosts facing that direction count.
    pub fn nodes_on_tile(
        &self,
        spatial: &dyn SpatialContext,
        grid: GridId,
        tile: TilePos,
        facing: Option<Direction>,
    ) -> Vec<EntityId> {
        spatial
            .anchored_at(grid, tile)
            .into_iter()
            .filter(|&host| match facing {
                Some(dir) => spatial.transform(host).is_some_and(|t| t.facing == dir),
                None => true,
            })
            .flat_map(|host| self.entity_nodes(host))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// `"<prototype> (<id>)"`, or just the id for unknown entities.
    pub fn describe(&self, entity: EntityId) -> String {
        match self.store.entities.get(entity) {
            Some(meta) => format!("{} ({entity:?})", meta.prototype),
            None => format!("<deleted> ({entity:?})"),
        }
    }

    pub fn diagnose_node(&self, node: EntityId) -> Option<DiagnosticInfo> {
        let n = self.store.nodes.get(node)?;
        Some(DiagnosticInfo {
            node,
            host: self.node_host(node),
            prototype: self
                .store
                .entities
                .get(node)
                .map(|m| m.prototype.clone())
                .unwrap_or_default(),
            proto: n.proto.clone(),
            graph: n.graph,
            flags: n.flags,
            edge_count: n.edges.len(),
            mergeable_edges: n.mergeable_edges,
            queued_for_edges: self.queues.edge_updates.contains(&node),
        })
    }
}
