//! Error types for registry construction and payload codecs.

use std::fmt;

use crate::ComponentTypeId;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while building a registry or codec table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same component type id was registered twice.
    DuplicateComponentId { id: ComponentTypeId },

    /// A component was registered with an empty name.
    EmptyName { id: ComponentTypeId },

    /// A codec was registered for a component the registry does not know.
    UnregisteredComponent { id: ComponentTypeId },
}

/// Errors raised by payload codecs at the encode/decode seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload bytes do not decode for this component type.
    Malformed { component: ComponentTypeId },

    /// The payload exceeds the registered maximum for this component type.
    TooLarge {
        component: ComponentTypeId,
        len: usize,
        max: usize,
    },

    /// No codec is registered for this component type.
    UnknownComponent { component: ComponentTypeId },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateComponentId { id } => {
                write!(f, "duplicate component type id {}", id.get())
            }
            Self::EmptyName { id } => {
                write!(f, "empty name for component type id {}", id.get())
            }
            Self::UnregisteredComponent { id } => {
                write!(f, "component type id {} is not in the registry", id.get())
            }
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { component } => {
                write!(f, "malformed payload for component {}", component.get())
            }
            Self::TooLarge {
                component,
                len,
                max,
            } => {
                write!(
                    f,
                    "payload for component {} too large: {len} > {max}",
                    component.get()
                )
            }
            Self::UnknownComponent { component } => {
                write!(f, "no codec registered for component {}", component.get())
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl std::error::Error for PayloadError {}
