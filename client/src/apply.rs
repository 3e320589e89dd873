//! Handing applied states to the consuming system.

use codec::{EntityId, GameState};
use registry::ComponentTypeId;

/// Receiver for the contents of an applied state.
///
/// Implemented by whatever owns the live objects (an ECS world, a scene
/// graph, a test mirror). Payload decoding happens behind the implementor's
/// codec table; the pipeline hands bytes through untouched.
pub trait StateSink {
    /// An entity entered the visible set; one call per component payload.
    fn enter(&mut self, entity: EntityId, component: ComponentTypeId, payload: &[u8]);

    /// A component on a visible entity changed.
    fn update(&mut self, entity: EntityId, component: ComponentTypeId, payload: &[u8]);

    /// A component was detached from a visible entity.
    fn remove(&mut self, entity: EntityId, component: ComponentTypeId);

    /// An entity left the visible set; release everything held for it.
    fn leave(&mut self, entity: EntityId);
}

/// Walks a state into a sink in dependency order: enters, then updates,
/// then removals, then leaves.
///
/// For a full state the caller is expected to clear the sink's world first
/// (`state.is_full()`); the state carries the entire visible set as enters.
pub fn apply_state(state: &GameState, sink: &mut dyn StateSink) {
    for enter in &state.enters {
        for component in &enter.components {
            sink.enter(enter.entity, component.component, &component.payload);
        }
    }
    for update in &state.updates {
        sink.update(update.entity, update.component, &update.payload);
    }
    for removal in &state.removals {
        sink.remove(removal.entity, removal.component);
    }
    for leave in &state.leaves {
        sink.leave(*leave);
    }
}
