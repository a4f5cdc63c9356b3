//! Replicated state records and the binary message envelope.
//!
//! Messages travel as bitcode bytes behind a small versioned header, so a
//! viewer built against another protocol revision is rejected instead of
//! misreading fields.

use nodenet_core::id::{EntityId, GraphId, GraphProto};
use nodenet_core::node::Edge;
use serde::{Deserialize, Serialize};

use crate::filter::VisRequest;
use crate::palette::Rgb;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a node-vis message.
pub const VIS_MAGIC: u32 = 0x4E56_0001;

/// Current protocol version. Increment when breaking the wire format.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", VIS_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported protocol version: expected {}, got {}", PROTOCOL_VERSION, .0)]
    UnsupportedVersion(u32),
}

// ---------------------------------------------------------------------------
// State records
// ---------------------------------------------------------------------------

/// What a viewer learns about a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    pub graph: GraphId,
    pub proto: GraphProto,
    pub member_count: usize,
    pub color: Rgb,
}

/// What a viewer learns about a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub node: EntityId,
    pub edges: Vec<Edge>,
    pub host: EntityId,
    pub graph: Option<GraphId>,
    pub graph_proto: GraphProto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisState {
    Graph(GraphState),
    Node(NodeState),
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisMessage {
    /// Viewer to simulation.
    Request(VisRequest),
    /// Simulation to viewer: everything the session may see at `tick`.
    States { tick: u64, states: Vec<VisState> },
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    magic: u32,
    version: u32,
    message: VisMessage,
}

impl VisMessage {
    pub fn encode(&self) -> Result<Vec<u8>, VisError> {
        let envelope = Envelope {
            magic: VIS_MAGIC,
            version: PROTOCOL_VERSION,
            message: self.clone(),
        };
        bitcode::serialize(&envelope).map_err(|e| VisError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, VisError> {
        let envelope: Envelope =
            bitcode::deserialize(data).map_err(|e| VisError::Decode(e.to_string()))?;
        if envelope.magic != VIS_MAGIC {
            return Err(VisError::InvalidMagic(envelope.magic));
        }
        if envelope.version != PROTOCOL_VERSION {
            return Err(VisError::UnsupportedVersion(envelope.version));
        }
        Ok(envelope.message)
    }
}
