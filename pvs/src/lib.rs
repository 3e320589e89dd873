//! Chunked-grid visibility selection ("PVS") for tickrep replication.
//!
//! Entities are bucketed into fixed-size square chunks per map. A session's
//! visible set is the union of chunks intersecting each observer's view
//! region (plus an overscan margin against pop-in), plus explicitly forced
//! entities, ranked and truncated deterministically so budget omissions stay
//! stable tick over tick instead of flickering.
//!
//! Visibility is recomputed by pull every tick; there is no event
//! subscription to invalidate.

mod index;
mod select;

pub use index::{MapId, SpatialIndex, Vec2};
pub use select::{Observer, SelectorConfig};
