use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a simulation entity: a node host, a poly host, a proxy or
    /// the entity backing a graph.
    pub struct EntityId;
}

/// Identifies a graph record.
///
/// Every graph is backed by its own entity, so a graph can carry state and be
/// queried (or even given node status) like any other entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId(pub EntityId);

impl GraphId {
    /// The entity backing this graph.
    pub fn entity(self) -> EntityId {
        self.0
    }
}

/// Type tag shared by every node of a graph (`"pipe"`, `"power_hv"`, ...).
///
/// Nodes only ever share a graph with nodes of the same proto.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphProto(pub String);

impl GraphProto {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GraphProto {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for GraphProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a poly entity exposes one of its proxy nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProxyKey(pub String);

impl ProxyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProxyKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ProxyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
