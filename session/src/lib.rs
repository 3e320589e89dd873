//! Per-session delta production and acknowledgment tracking for tickrep.
//!
//! The server side of the replication pipeline: for each connected session,
//! the tracker remembers the baseline the client has *acknowledged* and a
//! bounded window of what has been sent since. Each tick, [`SessionTracker::produce`]
//! selects the session's visible set, diffs it against the acked baseline,
//! and emits a [`codec::GameState`], or a budget-capped full state when the
//! session is fresh, explicitly resyncing, stalled past the ack timeout, or
//! has overflowed its in-flight window.
//!
//! Production for different sessions is independent and reads the snapshot
//! store through a shared immutable view, so all of one tick's diffs see
//! the same version map.

mod config;
mod error;
mod produce;
mod tracker;

pub use config::ProducerConfig;
pub use error::{SessionError, SessionResult};
pub use tracker::{SessionId, SessionTracker};
