//! Per-session interest tracking and state collection.

use std::collections::BTreeMap;

use nodenet_core::engine::Engine;
use nodenet_core::id::EntityId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filter::{VisFilter, VisRequest};
use crate::palette::VisPalette;
use crate::protocol::{GraphState, NodeState, VisMessage, VisState};

/// A connected debug viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// Decides what each observing session sees.
///
/// Replication is globally off until the first session enables and goes
/// off again as soon as the last observer disables or disconnects.
#[derive(Debug, Default)]
pub struct VisReplicator {
    sessions: BTreeMap<SessionId, VisFilter>,
    palette: VisPalette,
}

impl VisReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_palette(palette: VisPalette) -> Self {
        Self {
            sessions: BTreeMap::new(),
            palette,
        }
    }

    pub fn palette(&self) -> &VisPalette {
        &self.palette
    }

    /// Whether any session observes.
    pub fn is_enabled(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub fn is_observing(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn observer_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn filter(&self, session: SessionId) -> Option<&VisFilter> {
        self.sessions.get(&session)
    }

    /// Apply a request from `session`. Refining before enabling is ignored.
    pub fn handle(&mut self, session: SessionId, request: VisRequest) {
        match request {
            VisRequest::Enable => {
                if self.sessions.contains_key(&session) {
                    return;
                }
                let was_enabled = self.is_enabled();
                self.sessions.insert(session, self.palette.default_filter());
                if !was_enabled {
                    info!(session = session.0, "node graph replication enabled");
                }
            }
            VisRequest::Disable => self.remove_session(session),
            VisRequest::Refine { graphs, protos } => match self.sessions.get_mut(&session) {
                Some(filter) => filter.refine(&graphs, protos),
                None => debug!(session = session.0, "refine from a session that is not observing"),
            },
        }
    }

    /// Forget a session (disable or disconnect).
    pub fn remove_session(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_some() && self.sessions.is_empty() {
            info!(session = session.0, "node graph replication disabled");
        }
    }

    /// Drop filter entries for graphs that have been deleted.
    pub fn prune(&mut self, engine: &Engine) {
        for filter in self.sessions.values_mut() {
            filter.retain_graphs(|graph| engine.graph_proto(graph).is_some());
        }
    }

    // -----------------------------------------------------------------------
    // Collection
    // -----------------------------------------------------------------------

    /// Every graph and node `session` may see, graphs first. Empty for
    /// sessions that are not observing.
    pub fn collect(&self, engine: &Engine, session: SessionId) -> Vec<VisState> {
        let Some(filter) = self.sessions.get(&session) else {
            return Vec::new();
        };

        let mut graphs = Vec::new();
        let mut nodes = Vec::new();
        for graph in engine.graphs() {
            let Some(proto) = engine.graph_proto(graph) else {
                continue;
            };
            if !filter.allows_graph(graph, proto) {
                continue;
            }
            let members = engine.graph_nodes(graph).map(|m| m.len()).unwrap_or_default();
            graphs.push(VisState::Graph(GraphState {
                graph,
                proto: proto.clone(),
                member_count: members,
                color: self.palette.color_for(graph, proto),
            }));
            for &node in engine.graph_nodes(graph).into_iter().flatten() {
                nodes.extend(node_state(engine, node));
            }
        }

        // Nodes waiting for their first floodfill have no graph yet.
        for (node, record) in engine.storage().nodes.iter() {
            if record.graph.is_none() && filter.allows_proto(&record.proto) {
                nodes.extend(node_state(engine, node));
            }
        }

        graphs.extend(nodes.into_iter().map(VisState::Node));
        graphs
    }

    /// A state message for `session`, or `None` if it is not observing.
    pub fn message(&self, engine: &Engine, session: SessionId) -> Option<VisMessage> {
        if !self.is_observing(session) {
            return None;
        }
        Some(VisMessage::States {
            tick: engine.tick(),
            states: self.collect(engine, session),
        })
    }

    /// State messages for every observing session.
    pub fn messages(&self, engine: &Engine) -> BTreeMap<SessionId, VisMessage> {
        self.sessions
            .keys()
            .filter_map(|&session| Some((session, self.message(engine, session)?)))
            .collect()
    }
}

fn node_state(engine: &Engine, node: EntityId) -> Option<NodeState> {
    Some(NodeState {
        node,
        edges: engine.edges(node).to_vec(),
        host: engine.node_host(node),
        graph: engine.node_graph(node),
        graph_proto: engine.node_proto(node)?.clone(),
    })
}
