//! Per-session visible-set computation.

use std::collections::BTreeSet;

use codec::EntityId;

use crate::index::{MapId, SpatialIndex, Vec2};

/// Visibility selection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Extra margin added around each observer's view region so entities do
    /// not pop at the exact view edge.
    pub overscan: f32,
    /// Maximum entities replicated to one session per tick; the ranked
    /// prefix is kept, the rest are truncated.
    pub max_entities: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            overscan: 4.0,
            max_entities: 1024,
        }
    }
}

impl SelectorConfig {
    /// Creates a configuration suitable for testing with a small budget.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            overscan: 1.0,
            max_entities: 16,
        }
    }
}

/// One observation point of a session.
///
/// A session usually has one observer per controlled or viewed entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub map: MapId,
    pub pos: Vec2,
    pub view_range: f32,
}

impl Observer {
    /// Returns `true` if the observer has a usable position and range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.pos.is_finite() && self.view_range.is_finite() && self.view_range >= 0.0
    }
}

impl SpatialIndex {
    /// Computes the ordered visible set for a group of observers.
    ///
    /// The result is deterministic: forced entities first (ascending id),
    /// then chunk-visible entities by nearest-observer distance with entity
    /// id as the tiebreak. Truncation to `config.max_entities` therefore
    /// removes a consistent suffix rather than a flickering sample.
    ///
    /// Invalid observers contribute nothing; with no valid observer the
    /// result degrades to the forced set alone.
    #[must_use]
    pub fn visible_set(
        &self,
        observers: &[Observer],
        forced: &BTreeSet<EntityId>,
        config: &SelectorConfig,
    ) -> Vec<EntityId> {
        let mut candidates: BTreeSet<EntityId> = BTreeSet::new();
        for observer in observers.iter().filter(|observer| observer.is_valid()) {
            self.collect_in_view(observer, config.overscan, &mut candidates);
        }

        let mut result: Vec<EntityId> = forced.iter().copied().collect();

        let mut ranked: Vec<(f32, EntityId)> = candidates
            .iter()
            .filter(|entity| !forced.contains(*entity))
            .filter_map(|entity| {
                self.position(*entity)
                    .map(|(map, pos)| (nearest_distance_sq(observers, map, pos), *entity))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        result.extend(ranked.into_iter().map(|(_, entity)| entity));
        result.truncate(config.max_entities);
        result
    }

    fn collect_in_view(
        &self,
        observer: &Observer,
        overscan: f32,
        out: &mut BTreeSet<EntityId>,
    ) {
        let half = observer.view_range + overscan;
        let min = self.chunk_of(Vec2 {
            x: observer.pos.x - half,
            y: observer.pos.y - half,
        });
        let max = self.chunk_of(Vec2 {
            x: observer.pos.x + half,
            y: observer.pos.y + half,
        });

        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                if let Some(chunk) = self.chunk(observer.map, (cx, cy)) {
                    out.extend(chunk.iter().copied());
                }
            }
        }
    }
}

fn nearest_distance_sq(observers: &[Observer], map: MapId, pos: Vec2) -> f32 {
    observers
        .iter()
        .filter(|observer| observer.is_valid() && observer.map == map)
        .map(|observer| observer.pos.distance_sq(pos))
        .fold(f32::INFINITY, f32::min)
}
