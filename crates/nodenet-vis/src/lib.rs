//! Opt-in debug replication of node graph state.
//!
//! Graph internals are normally private to the simulation. Debug viewers
//! open a session and send [`VisRequest`]s; the [`VisReplicator`] tracks
//! which sessions observe what and, on each replication opportunity,
//! collects [`VisState`]s for exactly the graphs and nodes a session's
//! [`VisFilter`] admits. Nothing is collected while no session observes.
//!
//! # Key Types
//!
//! - [`VisReplicator`] -- Per-session interest and state collection.
//! - [`VisFilter`] -- Explicit per-graph allow/deny over a type allow-list.
//! - [`VisPalette`] -- Colour tags per graph type.
//! - [`VisMessage`] -- Wire envelope with a bitcode codec.

pub mod filter;
pub mod palette;
pub mod protocol;
pub mod replicator;

pub use filter::{VisFilter, VisRequest};
pub use palette::{Rgb, TypeStyle, VisPalette};
pub use protocol::{GraphState, NodeState, VisError, VisMessage, VisState};
pub use replicator::{SessionId, VisReplicator};
