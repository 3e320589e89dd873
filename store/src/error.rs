//! Error types for snapshot store operations.

use std::fmt;

use codec::EntityId;
use registry::ComponentTypeId;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The entity id does not refer to a live entity.
    ///
    /// Either the index was never spawned, or the generation is stale
    /// because the slot has been recycled.
    Dead { entity: EntityId },

    /// The component slot does not exist on this entity.
    MissingComponent {
        entity: EntityId,
        component: ComponentTypeId,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dead { entity } => write!(f, "entity {entity} is not alive"),
            Self::MissingComponent { entity, component } => {
                write!(
                    f,
                    "component {} not present on entity {entity}",
                    component.get()
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}
