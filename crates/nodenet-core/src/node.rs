//! Node, graph, and poly/proxy records and their SoA storage.

use crate::flags::{EdgeFlags, NodeFlags};
use crate::id::{EntityId, GraphId, GraphProto, ProxyKey};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::{BTreeMap, BTreeSet};

/// One half of an edge, stored on the node that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub peer: EntityId,
    pub flags: EdgeFlags,
}

impl Edge {
    pub const DEFAULT_FLAGS: EdgeFlags = EdgeFlags::empty();
}

/// Node status of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub edges: Vec<Edge>,
    pub graph: Option<GraphId>,
    pub proto: GraphProto,
    pub flags: NodeFlags,
    /// Number of edges without `NO_MERGE`.
    pub mergeable_edges: u32,
}

impl GraphNode {
    pub fn new(proto: GraphProto) -> Self {
        Self {
            edges: Vec::new(),
            graph: None,
            proto,
            flags: NodeFlags::empty(),
            mergeable_edges: 0,
        }
    }

    pub(crate) fn edge_index(&self, peer: EntityId) -> Option<usize> {
        self.edges.iter().position(|e| e.peer == peer)
    }

    /// Flags of the half-edge toward `peer`, if any.
    pub fn edge_to(&self, peer: EntityId) -> Option<EdgeFlags> {
        self.edges.iter().find(|e| e.peer == peer).map(|e| e.flags)
    }
}

/// A connected group of same-proto nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGraph {
    pub proto: GraphProto,
    pub nodes: BTreeSet<EntityId>,
    /// Members that may sit on a split boundary.
    pub split_nodes: BTreeSet<EntityId>,
    /// Members that may connect this graph to another.
    pub merge_nodes: BTreeSet<EntityId>,
}

impl NodeGraph {
    pub fn new(proto: GraphProto) -> Self {
        Self {
            proto,
            nodes: BTreeSet::new(),
            split_nodes: BTreeSet::new(),
            merge_nodes: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Poly capability: the entity hosts several keyed proxy nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyNode {
    pub proxies: BTreeMap<ProxyKey, EntityId>,
    /// Key under which the poly entity proxies itself, if it does.
    pub self_key: Option<ProxyKey>,
}

/// Back-reference from a proxy node to its poly owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyNode {
    pub poly: EntityId,
    pub key: ProxyKey,
}

/// Per-entity metadata kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub prototype: String,
}

/// SoA storage. Every record type has its own SecondaryMap keyed by the
/// owning entity; graph records are keyed by their backing entity.
#[derive(Debug, Default)]
pub struct Storage {
    pub entities: SlotMap<EntityId, EntityMeta>,
    pub nodes: SecondaryMap<EntityId, GraphNode>,
    pub graphs: SecondaryMap<EntityId, NodeGraph>,
    pub polys: SecondaryMap<EntityId, PolyNode>,
    pub proxies: SecondaryMap<EntityId, ProxyNode>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self, graph: GraphId) -> Option<&NodeGraph> {
        self.graphs.get(graph.entity())
    }

    pub fn graph_mut(&mut self, graph: GraphId) -> Option<&mut NodeGraph> {
        self.graphs.get_mut(graph.entity())
    }

    pub fn node(&self, node: EntityId) -> Option<&GraphNode> {
        self.nodes.get(node)
    }

    pub fn node_mut(&mut self, node: EntityId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(node)
    }

    /// Flags of the half-edge `node -> peer`.
    pub fn edge_flags(&self, node: EntityId, peer: EntityId) -> Option<EdgeFlags> {
        self.nodes.get(node).and_then(|n| n.edge_to(peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_graphless_and_uninitialised() {
        let node = GraphNode::new(GraphProto::from("pipe"));
        assert!(node.edges.is_empty());
        assert!(node.graph.is_none());
        assert!(node.flags.is_empty());
        assert_eq!(node.mergeable_edges, 0);
    }

    #[test]
    fn edge_lookup_by_peer() {
        let mut store = Storage::new();
        let a = store.entities.insert(EntityMeta { prototype: "a".into() });
        let b = store.entities.insert(EntityMeta { prototype: "b".into() });
        let mut node = GraphNode::new(GraphProto::from("pipe"));
        node.edges.push(Edge {
            peer: b,
            flags: EdgeFlags::AUTO,
        });
        store.nodes.insert(a, node);

        assert_eq!(store.edge_flags(a, b), Some(EdgeFlags::AUTO));
        assert_eq!(store.edge_flags(b, a), None);
        assert_eq!(store.nodes[a].edge_index(b), Some(0));
    }

    #[test]
    fn graph_records_keyed_by_backing_entity() {
        let mut store = Storage::new();
        let e = store.entities.insert(EntityMeta { prototype: "graph".into() });
        store.graphs.insert(e, NodeGraph::new(GraphProto::from("pipe")));
        let graph = GraphId(e);
        assert!(store.graph(graph).is_some_and(NodeGraph::is_empty));
        store.graph_mut(graph).unwrap().nodes.insert(e);
        assert_eq!(store.graph(graph).unwrap().len(), 1);
    }

    #[test]
    fn default_edge_flags_are_empty() {
        assert!(Edge::DEFAULT_FLAGS.is_empty());
    }
}
