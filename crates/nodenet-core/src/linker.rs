//! Automatic linker protocol.
//!
//! Linkers are registered per [`GraphProto`](crate::id::GraphProto) and decide
//! which automatic edges a node should have. During an edge update the
//! engine asks the linkers of the updating node's proto for the edges it
//! wants (these become `OUT` edges), then asks the linkers of each peer's
//! proto whether the peer accepts the edge (`IN`).
//!
//! Linkers see the engine read-only through a [`LinkContext`].

use crate::engine::Engine;
use crate::flags::EdgeFlags;
use crate::id::EntityId;
use crate::spatial::{HostTransform, SpatialContext};

// ---------------------------------------------------------------------------
// AutoLinker trait
// ---------------------------------------------------------------------------

/// Proposes and vets automatic edges for nodes of one proto.
pub trait AutoLinker: std::fmt::Debug {
    /// Human-readable name, used for lookup and debugging.
    fn name(&self) -> &str;

    /// Edges `node` wants, with the flags they should carry (from `node`'s
    /// point of view). `AUTO` and `OUT` are added by the engine.
    fn want_edges(&self, ctx: &LinkContext<'_>, node: EntityId) -> Vec<(EntityId, EdgeFlags)> {
        let _ = (ctx, node);
        Vec::new()
    }

    /// Whether `from` accepts an edge to `to`. `old` is the current state of
    /// the half-edge `from -> to`, if it exists. Returned flags are from
    /// `from`'s point of view.
    fn check_edge(
        &self,
        ctx: &LinkContext<'_>,
        from: EntityId,
        to: EntityId,
        old: Option<EdgeFlags>,
    ) -> Option<EdgeFlags> {
        let _ = (ctx, from, to, old);
        None
    }

    /// Downcast to `&dyn Any` for type-safe access to concrete linker types.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to `&mut dyn Any` for type-safe mutable access.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ---------------------------------------------------------------------------
// LinkContext
// ---------------------------------------------------------------------------

/// Read-only context passed to linkers.
pub struct LinkContext<'a> {
    pub engine: &'a Engine,
    pub spatial: &'a dyn SpatialContext,
}

impl<'a> LinkContext<'a> {
    pub fn new(engine: &'a Engine, spatial: &'a dyn SpatialContext) -> Self {
        Self { engine, spatial }
    }

    /// Host entity of `node` (the poly owner for proxies).
    pub fn host(&self, node: EntityId) -> EntityId {
        self.engine.node_host(node)
    }

    /// Anchor of `node`'s host.
    pub fn transform(&self, node: EntityId) -> Option<HostTransform> {
        self.spatial.transform(self.host(node))
    }
}

impl std::fmt::Debug for LinkContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkContext").finish_non_exhaustive()
    }
}
