//! Nodenet Core -- incremental connectivity tracking for typed node graphs.
//!
//! Simulation entities are given node status with a graph type (a
//! [`id::GraphProto`]). Nodes are joined by edges, either pinned manually or
//! discovered by automatic linkers. The engine keeps every connected group of
//! same-type nodes represented as exactly one graph record, updating the
//! records incrementally as edges come and go instead of rescanning the
//! world.
//!
//! # Update Loop
//!
//! Mutations only queue work. Each call to [`engine::Engine::update`]
//! drains the queues in a bounded fixed-point loop:
//!
//! 1. **Edges** -- recompute automatic edges; floodfill new nodes into graphs.
//! 2. **Splits** -- graphs that lost internal connectivity are partitioned.
//! 3. **Merges** -- graphs that gained a connection are folded together.
//!
//! ```rust,ignore
//! let mut engine = Engine::new();
//! engine.register_linker("pipe", Box::new(my_linker));
//! let a = engine.spawn_node("pipe_straight", "pipe");
//! let b = engine.spawn_node("pipe_straight", "pipe");
//! engine.try_add_edge(a, b, EdgeFlags::empty());
//! engine.update(&NoSpatial);
//! assert_eq!(engine.node_graph(a), engine.node_graph(b));
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns every record and drives the update loop.
//! - [`flags::EdgeFlags`] -- Provenance and mergeability of a half-edge.
//! - [`linker::AutoLinker`] -- Collaborator that proposes automatic edges.
//! - [`spatial::SpatialContext`] -- Read-only anchor lookups.
//! - [`event::EventBus`] -- Buffered graph notifications.

pub mod config;
pub mod edges;
pub mod engine;
pub mod event;
pub mod flags;
pub mod graph;
pub mod id;
pub mod linker;
pub mod node;
pub mod poly;
pub mod query;
pub mod queue;
pub mod report;
pub mod spatial;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
