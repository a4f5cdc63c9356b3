//! Anchored-entity grid and tile-adjacency linking for node graphs.
//!
//! [`AnchorGrid`] records which tile of which grid every host entity is
//! anchored on, and implements the core [`SpatialContext`] so it can be
//! handed to [`Engine::update`](nodenet_core::engine::Engine::update).
//! [`AdjacencyLinker`] proposes automatic edges between same-type nodes
//! on neighbouring tiles.

use std::collections::{BTreeMap, BTreeSet};

use nodenet_core::engine::Engine;
use nodenet_core::id::EntityId;
use nodenet_core::spatial::{Direction, GridId, HostTransform, SpatialContext, TilePos};
use slotmap::SecondaryMap;
use tracing::trace;

pub mod adjacency;
pub use adjacency::{AdjacencyLinker, DirectionMask};

/// Errors from anchoring operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("entity {0:?} is not anchored")]
    NotAnchored(EntityId),
    #[error("entity {0:?} is already anchored")]
    AlreadyAnchored(EntityId),
}

// ---------------------------------------------------------------------------
// AnchorGrid
// ---------------------------------------------------------------------------

/// Anchors of host entities on tile grids.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: (grid, tile) -> entities anchored there
/// - `anchors`: entity -> its transform
///
/// Several entities may share a tile.
#[derive(Debug, Default)]
pub struct AnchorGrid {
    tiles: BTreeMap<(GridId, TilePos), BTreeSet<EntityId>>,
    anchors: SecondaryMap<EntityId, HostTransform>,
}

impl AnchorGrid {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Anchoring --

    pub fn anchor(
        &mut self,
        entity: EntityId,
        grid: GridId,
        tile: TilePos,
        facing: Direction,
    ) -> Result<(), SpatialError> {
        if self.anchors.contains_key(entity) {
            return Err(SpatialError::AlreadyAnchored(entity));
        }
        self.tiles.entry((grid, tile)).or_default().insert(entity);
        self.anchors.insert(entity, HostTransform { grid, tile, facing });
        trace!(?entity, ?grid, ?tile, ?facing, "anchored");
        Ok(())
    }

    /// Remove an anchor. Returns where the entity was.
    pub fn unanchor(&mut self, entity: EntityId) -> Result<HostTransform, SpatialError> {
        let transform = self
            .anchors
            .remove(entity)
            .ok_or(SpatialError::NotAnchored(entity))?;
        let key = (transform.grid, transform.tile);
        if let Some(occupants) = self.tiles.get_mut(&key) {
            occupants.remove(&entity);
            if occupants.is_empty() {
                self.tiles.remove(&key);
            }
        }
        trace!(?entity, grid = ?transform.grid, tile = ?transform.tile, "unanchored");
        Ok(transform)
    }

    /// Re-anchor an already anchored entity. Returns the previous transform.
    pub fn move_to(
        &mut self,
        entity: EntityId,
        grid: GridId,
        tile: TilePos,
        facing: Direction,
    ) -> Result<HostTransform, SpatialError> {
        let previous = self.unanchor(entity)?;
        self.anchor(entity, grid, tile, facing)?;
        Ok(previous)
    }

    /// Turn an anchored entity in place.
    pub fn rotate_to(&mut self, entity: EntityId, facing: Direction) -> Result<HostTransform, SpatialError> {
        let current = *self
            .anchors
            .get(entity)
            .ok_or(SpatialError::NotAnchored(entity))?;
        self.move_to(entity, current.grid, current.tile, facing)
    }

    // -- Queries --

    pub fn is_anchored(&self, entity: EntityId) -> bool {
        self.anchors.contains_key(entity)
    }

    /// Entities anchored on the four tiles around `entity`, with the
    /// direction they lie in.
    pub fn neighbours(&self, entity: EntityId) -> Vec<(Direction, EntityId)> {
        let Some(t) = self.anchors.get(entity) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for dir in Direction::all() {
            if let Some(occupants) = self.tiles.get(&(t.grid, t.tile.step(dir))) {
                result.extend(occupants.iter().map(|&other| (dir, other)));
            }
        }
        result
    }

    /// Number of anchored entities.
    pub fn entity_count(&self) -> usize {
        self.anchors.len()
    }

    /// Number of occupied tiles across all grids.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    // -- Engine glue --

    /// Queue edge updates for every node hosted by `entity` and by its
    /// neighbours. Call after anchoring, moving, or re-configuring openings.
    pub fn queue_neighbourhood(&self, engine: &mut Engine, entity: EntityId) {
        let hosts = std::iter::once(entity).chain(self.neighbours(entity).into_iter().map(|(_, e)| e));
        for host in hosts {
            for node in engine.entity_nodes(host) {
                engine.queue_edge_update(node);
            }
        }
    }
}

impl SpatialContext for AnchorGrid {
    fn transform(&self, entity: EntityId) -> Option<HostTransform> {
        self.anchors.get(entity).copied()
    }

    fn anchored_at(&self, grid: GridId, tile: TilePos) -> Vec<EntityId> {
        self.tiles
            .get(&(grid, tile))
            .map(|occupants| occupants.iter().copied().collect())
            .unwrap_or_default()
    }
}
