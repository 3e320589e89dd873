//! Component type registry and payload codec definitions for tickrep.
//!
//! This crate pins down the replicated component id space:
//! - Component definitions (id, name, payload size bound)
//! - A deterministic registry hash for cross-endpoint compatibility
//! - The [`PayloadCodec`]/[`CodecTable`] seam where typed component state is
//!   turned into opaque payload bytes and back
//!
//! # Design Principles
//!
//! - **Resolved once** - The registry and codec table are built at startup;
//!   the pipeline dispatches on ids, never on runtime types.
//! - **Opaque payloads** - The replication core compares versions, not bytes.
//! - **Deterministic hashing** - The registry hash is stable given the same
//!   definitions in the same order.

mod def;
mod error;
mod hash;
mod table;

pub use def::{ComponentDef, ComponentTypeId, Registry, RegistryBuilder};
pub use error::{PayloadError, RegistryError, RegistryResult};
pub use hash::registry_hash;
pub use table::{CodecTable, PayloadCodec};
