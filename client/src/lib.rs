//! Client-side tick buffering and state processing for tickrep.
//!
//! The receive path of the replication pipeline: decoded states are ordered
//! by `to_tick` in a bounded buffer, and once per render tick the processor
//! decides whether a real state can be applied (its `from_tick` chains onto
//! the last applied real tick), a fabricated state should be held in its
//! place, or nothing safe exists and the caller must wait or rewind.
//!
//! Reliability lives here, not in the transport: duplicates, reordering and
//! loss all resolve to "apply only chain-valid states, acknowledge only what
//! was applied, and fall back to a full-state resync when the chain cannot
//! be bridged".

mod apply;
mod config;
mod processor;

pub use apply::{apply_state, StateSink};
pub use config::ProcessorConfig;
pub use processor::{ProcessorStatus, StateProcessor, TickOutcome};
