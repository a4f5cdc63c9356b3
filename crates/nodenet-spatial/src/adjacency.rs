//! Automatic linking of same-type nodes on neighbouring tiles.
//!
//! Two nodes link when their hosts sit on orthogonally adjacent tiles of
//! the same grid and each has an opening toward the other. Openings are
//! given relative to a north-facing host and turn with its facing.

use std::collections::{BTreeMap, BTreeSet};

use nodenet_core::flags::EdgeFlags;
use nodenet_core::id::EntityId;
use nodenet_core::linker::{AutoLinker, LinkContext};
use nodenet_core::spatial::Direction;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Sides of a tile that accept connections.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DirectionMask: u8 {
        const NORTH = 1 << 0;
        const EAST = 1 << 1;
        const SOUTH = 1 << 2;
        const WEST = 1 << 3;

        const ALL = Self::NORTH.bits() | Self::EAST.bits() | Self::SOUTH.bits() | Self::WEST.bits();
    }
}

impl DirectionMask {
    pub fn from_direction(dir: Direction) -> Self {
        match dir {
            Direction::North => Self::NORTH,
            Direction::East => Self::EAST,
            Direction::South => Self::SOUTH,
            Direction::West => Self::WEST,
        }
    }

    pub fn allows(self, dir: Direction) -> bool {
        self.contains(Self::from_direction(dir))
    }

    /// The mask of a host turned from north to `facing`.
    pub fn rotated(self, facing: Direction) -> Self {
        let turns = match facing {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        };
        let mut mask = Self::empty();
        for dir in Direction::all() {
            if self.allows(dir) {
                let mut turned = dir;
                for _ in 0..turns {
                    turned = turned.rotate_cw();
                }
                mask |= Self::from_direction(turned);
            }
        }
        mask
    }
}

impl Default for DirectionMask {
    fn default() -> Self {
        Self::ALL
    }
}

// ---------------------------------------------------------------------------
// AdjacencyLinker
// ---------------------------------------------------------------------------

/// Links nodes whose hosts face each other across a tile boundary.
///
/// Openings can be set per node or per host entity; a node's own mask wins
/// over its host's. An entity marked closed still links, but every edge it
/// takes part in is `NO_MERGE`.
#[derive(Debug, Default)]
pub struct AdjacencyLinker {
    openings: BTreeMap<EntityId, DirectionMask>,
    closed: BTreeSet<EntityId>,
}

impl AdjacencyLinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_openings(&mut self, entity: EntityId, mask: DirectionMask) {
        self.openings.insert(entity, mask);
    }

    pub fn clear_openings(&mut self, entity: EntityId) {
        self.openings.remove(&entity);
    }

    /// Mark a host (or node) as closed, like a shut valve.
    pub fn set_closed(&mut self, entity: EntityId, closed: bool) {
        if closed {
            self.closed.insert(entity);
        } else {
            self.closed.remove(&entity);
        }
    }

    pub fn is_closed(&self, entity: EntityId) -> bool {
        self.closed.contains(&entity)
    }

    /// Drop everything recorded about `entity`.
    pub fn forget(&mut self, entity: EntityId) {
        self.openings.remove(&entity);
        self.closed.remove(&entity);
    }

    /// World-space openings of `node`.
    fn openings_of(&self, ctx: &LinkContext<'_>, node: EntityId, facing: Direction) -> DirectionMask {
        let host = ctx.host(node);
        self.openings
            .get(&node)
            .or_else(|| self.openings.get(&host))
            .copied()
            .unwrap_or_default()
            .rotated(facing)
    }

    fn closes(&self, ctx: &LinkContext<'_>, node: EntityId) -> bool {
        self.closed.contains(&node) || self.closed.contains(&ctx.host(node))
    }
}

impl AutoLinker for AdjacencyLinker {
    fn name(&self) -> &str {
        "adjacency"
    }

    fn want_edges(&self, ctx: &LinkContext<'_>, node: EntityId) -> Vec<(EntityId, EdgeFlags)> {
        let Some(here) = ctx.transform(node) else {
            return Vec::new();
        };
        let Some(proto) = ctx.engine.node_proto(node) else {
            return Vec::new();
        };
        let open = self.openings_of(ctx, node, here.facing);
        let host = ctx.host(node);

        let mut wanted = Vec::new();
        for dir in Direction::all() {
            if !open.allows(dir) {
                continue;
            }
            for other in ctx.spatial.anchored_at(here.grid, here.tile.step(dir)) {
                if other == host {
                    continue;
                }
                let Some(there) = ctx.spatial.transform(other) else {
                    continue;
                };
                for peer in ctx.engine.entity_nodes(other) {
                    if ctx.engine.node_proto(peer) != Some(proto) {
                        continue;
                    }
                    if !self.openings_of(ctx, peer, there.facing).allows(dir.opposite()) {
                        continue;
                    }
                    let flags = if self.closes(ctx, node) || self.closes(ctx, peer) {
                        EdgeFlags::NO_MERGE
                    } else {
                        EdgeFlags::empty()
                    };
                    wanted.push((peer, flags));
                }
            }
        }
        wanted
    }

    fn check_edge(
        &self,
        ctx: &LinkContext<'_>,
        from: EntityId,
        to: EntityId,
        _old: Option<EdgeFlags>,
    ) -> Option<EdgeFlags> {
        self.want_edges(ctx, from)
            .into_iter()
            .find(|(peer, _)| *peer == to)
            .map(|(_, flags)| flags)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
