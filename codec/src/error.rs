//! Error types for state encoding/decoding.

use std::fmt;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during state encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Wire format error.
    Wire(wire::DecodeError),

    /// Byte-level read error inside a section body.
    Bytes(wire::ByteError),

    /// Output buffer is too small.
    OutputTooSmall { needed: usize, available: usize },

    /// Registry hash mismatch between endpoints.
    RegistryMismatch { expected: u64, found: u64 },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Tick range is not valid for the state kind.
    InvalidTickRange { from_tick: u64, to_tick: u64 },

    /// Component type id is zero or not registered.
    UnknownComponent { raw: u16 },

    /// Payload exceeds the registered maximum for its component type.
    PayloadTooLarge {
        component: u16,
        len: usize,
        max: usize,
    },

    /// Entities are not in strictly ascending order.
    InvalidEntityOrder { previous: u64, current: u64 },

    /// Components within an entity are not in strictly ascending order.
    InvalidComponentOrder {
        entity: u64,
        previous: u16,
        current: u16,
    },

    /// Section body had trailing bytes after parsing.
    TrailingSectionData {
        section: wire::SectionTag,
        remaining: usize,
    },

    /// Duplicate section encountered.
    DuplicateSection { section: wire::SectionTag },

    /// Section is not allowed for the packet kind.
    UnexpectedSection { section: wire::SectionTag },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Enters,
    Leaves,
    Updates,
    Removals,
    ComponentsPerEntity,
    ExtraBytes,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(e) => write!(f, "wire error: {e}"),
            Self::Bytes(e) => write!(f, "byte error: {e}"),
            Self::OutputTooSmall { needed, available } => {
                write!(f, "output too small: need {needed}, have {available}")
            }
            Self::RegistryMismatch { expected, found } => {
                write!(
                    f,
                    "registry hash mismatch: expected 0x{expected:016X}, found 0x{found:016X}"
                )
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::InvalidTickRange { from_tick, to_tick } => {
                write!(f, "invalid tick range {from_tick}..{to_tick}")
            }
            Self::UnknownComponent { raw } => {
                write!(f, "unknown component type id {raw}")
            }
            Self::PayloadTooLarge {
                component,
                len,
                max,
            } => {
                write!(
                    f,
                    "payload for component {component} too large: {len} > {max}"
                )
            }
            Self::InvalidEntityOrder { previous, current } => {
                write!(f, "entity order invalid: {previous} then {current}")
            }
            Self::InvalidComponentOrder {
                entity,
                previous,
                current,
            } => {
                write!(
                    f,
                    "component order invalid on entity {entity}: {previous} then {current}"
                )
            }
            Self::TrailingSectionData { section, remaining } => {
                write!(f, "trailing data in section {section:?}: {remaining} bytes")
            }
            Self::DuplicateSection { section } => {
                write!(f, "duplicate section {section:?} in packet")
            }
            Self::UnexpectedSection { section } => {
                write!(f, "unexpected section {section:?} in full state")
            }
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enters => "enter entities",
            Self::Leaves => "leave entities",
            Self::Updates => "component updates",
            Self::Removals => "component removals",
            Self::ComponentsPerEntity => "components per entity",
            Self::ExtraBytes => "extra payload bytes",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(e) => Some(e),
            Self::Bytes(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wire::DecodeError> for CodecError {
    fn from(err: wire::DecodeError) -> Self {
        Self::Wire(err)
    }
}

impl From<wire::ByteError> for CodecError {
    fn from(err: wire::ByteError) -> Self {
        Self::Bytes(err)
    }
}
