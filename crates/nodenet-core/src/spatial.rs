//! Read-only view of where node hosts are anchored.
//!
//! The engine never owns positions. Automatic linkers and tile lookups go
//! through a [`SpatialContext`] supplied by the caller on every update.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};

/// Identifies a grid (a map, a ship, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridId(pub u32);

/// A tile on a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring tile in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }
}

/// Where and how an entity is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostTransform {
    pub grid: GridId,
    pub tile: TilePos,
    pub facing: Direction,
}

/// Spatial lookups the engine consumes.
pub trait SpatialContext {
    /// Anchor information for `entity`, or `None` if it is not anchored.
    fn transform(&self, entity: EntityId) -> Option<HostTransform>;

    /// Entities anchored on `tile` of `grid`.
    fn anchored_at(&self, grid: GridId, tile: TilePos) -> Vec<EntityId>;
}

/// A world with nothing anchored anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpatial;

impl SpatialContext for NoSpatial {
    fn transform(&self, _entity: EntityId) -> Option<HostTransform> {
        None
    }

    fn anchored_at(&self, _grid: GridId, _tile: TilePos) -> Vec<EntityId> {
        Vec::new()
    }
}
