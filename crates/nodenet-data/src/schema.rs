//! Serde data file structs for engine configuration.
//!
//! `engine.{ron,toml,json}` deserializes straight into
//! [`EngineConfig`](nodenet_core::config::EngineConfig); the graph type
//! table is described here.

use serde::Deserialize;

/// One graph type in `graph_types.*`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphTypeData {
    pub name: String,
    /// `[r, g, b]` colour tag for debug viewers.
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    /// Whether debug viewers see this type before asking for it.
    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}
