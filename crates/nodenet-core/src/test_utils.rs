//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::Engine;
use crate::flags::EdgeFlags;
use crate::id::{EntityId, GraphId, GraphProto};
use crate::linker::{AutoLinker, LinkContext};
use crate::report::UpdateReport;
use crate::spatial::NoSpatial;

// ===========================================================================
// TableLinker
// ===========================================================================

/// An automatic linker driven by an explicit table of wanted edges.
///
/// `check_edge(from, to)` accepts exactly when `from` wants `to`, so linking
/// both directions yields edges carrying `IN | OUT` on both halves.
#[derive(Debug, Default)]
pub struct TableLinker {
    wants: BTreeMap<EntityId, BTreeMap<EntityId, EdgeFlags>>,
}

impl TableLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `from` wants an edge to `to` carrying `flags`.
    pub fn want(&mut self, from: EntityId, to: EntityId, flags: EdgeFlags) {
        self.wants.entry(from).or_default().insert(to, flags);
    }

    /// Both ends want a plain mergeable edge.
    pub fn link(&mut self, a: EntityId, b: EntityId) {
        self.want(a, b, EdgeFlags::empty());
        self.want(b, a, EdgeFlags::empty());
    }

    /// Both ends want an edge that does not connect graphs.
    pub fn link_closed(&mut self, a: EntityId, b: EntityId) {
        self.want(a, b, EdgeFlags::NO_MERGE);
        self.want(b, a, EdgeFlags::NO_MERGE);
    }

    /// Neither end wants the edge any more.
    pub fn unlink(&mut self, a: EntityId, b: EntityId) {
        if let Some(w) = self.wants.get_mut(&a) {
            w.remove(&b);
        }
        if let Some(w) = self.wants.get_mut(&b) {
            w.remove(&a);
        }
    }

    /// Forget everything `node` wants.
    pub fn forget(&mut self, node: EntityId) {
        self.wants.remove(&node);
    }
}

impl AutoLinker for TableLinker {
    fn name(&self) -> &str {
        "table"
    }

    fn want_edges(&self, _ctx: &LinkContext<'_>, node: EntityId) -> Vec<(EntityId, EdgeFlags)> {
        self.wants
            .get(&node)
            .map(|w| w.iter().map(|(peer, flags)| (*peer, *flags)).collect())
            .unwrap_or_default()
    }

    fn check_edge(
        &self,
        _ctx: &LinkContext<'_>,
        from: EntityId,
        to: EntityId,
        _old: Option<EdgeFlags>,
    ) -> Option<EdgeFlags> {
        self.wants.get(&from)?.get(&to).copied()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// An engine with a [`TableLinker`] registered for `proto`.
pub fn engine_with_table(proto: &str) -> Engine {
    let mut engine = Engine::new();
    register_table(&mut engine, proto);
    engine
}

pub fn register_table(engine: &mut Engine, proto: &str) {
    engine.register_linker(proto, Box::new(TableLinker::new()));
}

/// The first registered [`TableLinker`].
pub fn table(engine: &mut Engine) -> &mut TableLinker {
    engine
        .linker_mut::<TableLinker>()
        .expect("no TableLinker registered")
}

pub fn pipe() -> GraphProto {
    GraphProto::from("pipe")
}

/// Spawn `N` pipe nodes.
pub fn spawn_pipes<const N: usize>(engine: &mut Engine) -> [EntityId; N] {
    std::array::from_fn(|_| engine.spawn_node("pipe_segment", "pipe"))
}

/// Link consecutive nodes in the table linker.
pub fn chain(engine: &mut Engine, nodes: &[EntityId]) {
    let t = table(engine);
    for pair in nodes.windows(2) {
        t.link(pair[0], pair[1]);
    }
}

/// Keys with no backing engine, for tests that only need distinct handles.
pub fn spawn_ids(count: usize) -> Vec<EntityId> {
    let mut sm: slotmap::SlotMap<EntityId, ()> = slotmap::SlotMap::with_key();
    (0..count).map(|_| sm.insert(())).collect()
}

/// Run updates with no spatial context until the engine settles.
pub fn settle(engine: &mut Engine) -> UpdateReport {
    let report = engine.update(&NoSpatial);
    assert!(!report.capped, "update hit the iteration cap");
    assert!(engine.is_settled());
    report
}

// ===========================================================================
// Invariant checks
// ===========================================================================

/// Check that graphs match connectivity exactly: every group of same-proto
/// nodes joined by mergeable edges is one non-empty graph holding exactly
/// that group.
pub fn check_connectivity(engine: &Engine) -> Result<(), String> {
    let store = engine.storage();
    let mut seen: BTreeSet<EntityId> = BTreeSet::new();
    let mut graphs_used: BTreeSet<GraphId> = BTreeSet::new();

    for (start, node) in store.nodes.iter() {
        if seen.contains(&start) {
            continue;
        }
        let mut component = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for edge in engine.edges(current) {
                if !edge.flags.is_mergeable() {
                    continue;
                }
                let same_proto = store.nodes.get(edge.peer).is_some_and(|p| p.proto == node.proto);
                if same_proto && component.insert(edge.peer) {
                    stack.push(edge.peer);
                }
            }
        }
        seen.extend(component.iter().copied());

        let Some(graph) = node.graph else {
            return Err(format!("{} has no graph", engine.describe(start)));
        };
        for &member in &component {
            if engine.node_graph(member) != Some(graph) {
                return Err(format!(
                    "{} is connected to {} but in another graph",
                    engine.describe(member),
                    engine.describe(start)
                ));
            }
        }
        let members = engine.graph_nodes(graph).cloned().unwrap_or_default();
        if members != component {
            return Err(format!(
                "graph {:?} holds {} nodes but the connected group has {}",
                graph.entity(),
                members.len(),
                component.len()
            ));
        }
        if !graphs_used.insert(graph) {
            return Err(format!("graph {:?} holds two groups", graph.entity()));
        }
    }

    for graph in engine.graphs() {
        if engine.graph_nodes(graph).is_none_or(BTreeSet::is_empty) {
            return Err(format!("graph {:?} is empty", graph.entity()));
        }
        if !graphs_used.contains(&graph) {
            return Err(format!("graph {:?} holds no connected group", graph.entity()));
        }
    }
    Ok(())
}
