use crate::id::{EntityId, GraphId};
use std::collections::BTreeSet;

/// Pending work for the update driver.
///
/// Sets rather than FIFOs: membership is what matters, and iterating in
/// handle order keeps resolution deterministic.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueues {
    pub edge_updates: BTreeSet<EntityId>,
    pub split_graphs: BTreeSet<GraphId>,
    pub merge_graphs: BTreeSet<GraphId>,
}

impl UpdateQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is waiting to be resolved.
    pub fn is_empty(&self) -> bool {
        self.edge_updates.is_empty() && self.split_graphs.is_empty() && self.merge_graphs.is_empty()
    }

    /// Drop every queued entry that refers to `graph`.
    pub fn forget_graph(&mut self, graph: GraphId) {
        self.split_graphs.remove(&graph);
        self.merge_graphs.remove(&graph);
    }

    pub fn clear(&mut self) {
        self.edge_updates.clear();
        self.split_graphs.clear();
        self.merge_graphs.clear();
    }
}
