//! Producer configuration.

/// Budgets and timeouts for per-session delta production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Maximum entities entering a session's visible set per tick.
    ///
    /// Truncated enters stay outside the recorded baseline and re-enter on
    /// a later tick, so nothing is lost, only deferred.
    pub max_enters_per_tick: usize,

    /// Maximum leave records per tick.
    pub max_leaves_per_tick: usize,

    /// Soft byte budget for enter and update payloads per tick.
    ///
    /// The first record always fits regardless of size, so a single payload
    /// larger than the budget still makes progress.
    pub update_byte_budget: usize,

    /// Ticks without an acknowledgment before the session is presumed
    /// stalled and degraded to budget-capped full states.
    pub ack_timeout_ticks: u64,

    /// Maximum un-acked sent states remembered per session. Overflow forces
    /// a full state instead of accumulating divergence.
    pub in_flight_window: usize,

    /// Whether an empty diff is sent as a heartbeat (keeps acks flowing on
    /// quiet links) or elided.
    pub heartbeat_when_empty: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_enters_per_tick: 64,
            max_leaves_per_tick: 64,
            update_byte_budget: 16 * 1024,
            ack_timeout_ticks: 90,
            in_flight_window: 32,
            heartbeat_when_empty: true,
        }
    }
}

impl ProducerConfig {
    /// Creates a configuration suitable for testing with tight budgets.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_enters_per_tick: 4,
            max_leaves_per_tick: 4,
            update_byte_budget: 256,
            ack_timeout_ticks: 8,
            in_flight_window: 4,
            heartbeat_when_empty: true,
        }
    }
}
