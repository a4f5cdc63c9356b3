//! Session requests and the per-session visibility filter.

use std::collections::{BTreeMap, BTreeSet};

use nodenet_core::id::{GraphId, GraphProto};
use serde::{Deserialize, Serialize};

/// A message from a debug viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisRequest {
    /// Start observing.
    Enable,
    /// Stop observing.
    Disable,
    /// Narrow or widen what is observed.
    ///
    /// `graphs` entries override earlier entries for the same graph.
    /// `protos` replaces the type selection, including types hidden by
    /// default; `None` allows every type.
    Refine {
        graphs: Vec<(GraphId, bool)>,
        protos: Option<Vec<String>>,
    },
}

/// What one session may see.
///
/// An explicit entry for a graph always wins. Otherwise a graph is visible
/// when its type is allowed and not hidden; `protos: None` allows every
/// type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisFilter {
    pub graphs: BTreeMap<GraphId, bool>,
    pub protos: Option<BTreeSet<String>>,
    pub hidden: BTreeSet<String>,
}

impl VisFilter {
    /// A filter admitting everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter admitting only the given types.
    pub fn only<I, S>(protos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protos: Some(protos.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// A filter admitting every type except the given ones.
    pub fn except<I, S>(hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hidden: hidden.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn allows_graph(&self, graph: GraphId, proto: &GraphProto) -> bool {
        match self.graphs.get(&graph) {
            Some(&explicit) => explicit,
            None => self.allows_proto(proto),
        }
    }

    pub fn allows_proto(&self, proto: &GraphProto) -> bool {
        !self.hidden.contains(proto.as_str())
            && self
                .protos
                .as_ref()
                .is_none_or(|allowed| allowed.contains(proto.as_str()))
    }

    /// Apply a [`VisRequest::Refine`] payload.
    pub fn refine(&mut self, graphs: &[(GraphId, bool)], protos: Option<Vec<String>>) {
        self.graphs.extend(graphs.iter().copied());
        self.protos = protos.map(|p| p.into_iter().collect());
        self.hidden.clear();
    }

    /// Forget explicit entries for graphs that no longer exist.
    pub fn retain_graphs(&mut self, mut exists: impl FnMut(GraphId) -> bool) {
        self.graphs.retain(|&graph, _| exists(graph));
    }
}
