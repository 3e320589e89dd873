//! `GameState` model and encoding/decoding for tickrep state replication.
//!
//! This crate ties wire framing and the component registry together: a
//! [`GameState`] describes everything one session must change to advance
//! from `from_tick` to `to_tick`: entities entering its visible set (with
//! full component payloads), entities leaving, changed component payloads,
//! and explicit component removals.
//!
//! # Design Principles
//!
//! - **Correctness first** - All invariants are documented and tested.
//! - **Deterministic** - Same state encodes to the same bytes; record order
//!   is enforced on both sides.
//! - **Bounded decoding** - Malformed or oversized input is a structured
//!   error, never a panic or unbounded allocation.

mod decode;
mod encode;
mod error;
mod limits;
mod state;
mod types;

pub use decode::{decode_state, decode_state_from_packet};
pub use encode::encode_state;
pub use error::{CodecError, CodecResult, LimitKind};
pub use limits::CodecLimits;
pub use state::{ComponentPayload, ComponentRemoval, ComponentUpdate, EntityEnter, GameState};
pub use types::{EntityId, Tick};
pub use wire::Limits as WireLimits;
