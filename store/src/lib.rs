//! Versioned snapshot store for tickrep delta production.
//!
//! The store is the single shared resource between the simulation (writer)
//! and per-session delta production (readers). It tracks, per entity and per
//! component type, the serialized payload and the store-wide version at
//! which it last changed. Delta producers never look at payload bytes; they
//! compare versions against a session's acknowledged baseline.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{ComponentSlot, SnapshotStore, StoreView};
