//! Spatial bucketing of entities into per-map chunks.

use std::collections::{BTreeSet, HashMap};

use codec::EntityId;

/// A map (world space) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(pub u32);

/// Basic 2D vector for spatial queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[must_use]
    pub fn distance_sq(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

pub(crate) type ChunkCoord = (i32, i32);

/// Entities bucketed into fixed-size chunks per map.
///
/// The simulation feeds positions in; the selector queries chunk ranges out.
/// Chunk membership is deterministic (`BTreeSet` per chunk), so iteration
/// order never depends on insertion history.
#[derive(Debug)]
pub struct SpatialIndex {
    chunk_size: f32,
    chunks: HashMap<(MapId, ChunkCoord), BTreeSet<EntityId>>,
    positions: HashMap<EntityId, (MapId, Vec2)>,
}

impl SpatialIndex {
    /// Creates an index with the given chunk edge length.
    ///
    /// `chunk_size` must be positive.
    #[must_use]
    pub fn new(chunk_size: f32) -> Self {
        debug_assert!(chunk_size > 0.0);
        Self {
            chunk_size,
            chunks: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    /// Returns the chunk edge length.
    #[must_use]
    pub const fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Returns the number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no entities are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns `true` if the entity is tracked.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.positions.contains_key(&entity)
    }

    /// Returns the last known map and position for an entity.
    #[must_use]
    pub fn position(&self, entity: EntityId) -> Option<(MapId, Vec2)> {
        self.positions.get(&entity).copied()
    }

    /// Tracks or moves an entity.
    ///
    /// A non-finite position is ignored and the entity keeps its last known
    /// chunk (an entity mid-teleport stays where it was last seen rather
    /// than corrupting the index).
    pub fn update_entity(&mut self, entity: EntityId, map: MapId, pos: Vec2) {
        if !pos.is_finite() {
            return;
        }
        if let Some((old_map, old_pos)) = self.positions.get(&entity).copied() {
            let old_key = (old_map, self.chunk_of(old_pos));
            let new_key = (map, self.chunk_of(pos));
            if old_key != new_key {
                self.remove_from_chunk(old_key, entity);
                self.chunks.entry(new_key).or_default().insert(entity);
            }
        } else {
            let key = (map, self.chunk_of(pos));
            self.chunks.entry(key).or_default().insert(entity);
        }
        self.positions.insert(entity, (map, pos));
    }

    /// Stops tracking an entity.
    pub fn remove_entity(&mut self, entity: EntityId) {
        if let Some((map, pos)) = self.positions.remove(&entity) {
            self.remove_from_chunk((map, self.chunk_of(pos)), entity);
        }
    }

    /// Returns the entities in one chunk, if any.
    pub(crate) fn chunk(&self, map: MapId, coord: ChunkCoord) -> Option<&BTreeSet<EntityId>> {
        self.chunks.get(&(map, coord))
    }

    /// Maps a position to its chunk coordinate.
    pub(crate) fn chunk_of(&self, pos: Vec2) -> ChunkCoord {
        (
            (pos.x / self.chunk_size).floor() as i32,
            (pos.y / self.chunk_size).floor() as i32,
        )
    }

    fn remove_from_chunk(&mut self, key: (MapId, ChunkCoord), entity: EntityId) {
        if let Some(set) = self.chunks.get_mut(&key) {
            set.remove(&entity);
            if set.is_empty() {
                self.chunks.remove(&key);
            }
        }
    }
}
