//! Processor configuration.

/// Tuning for the client-side state processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Buffered states required before processing starts.
    ///
    /// Holding a few states back at startup smooths over jitter; a full
    /// state bypasses the gate. Once processing has started the chain rules
    /// take over.
    pub min_buffer_fill: usize,

    /// Whether missing states may be bridged by extrapolating the last
    /// applied real state.
    pub extrapolation: bool,

    /// Consecutive extrapolated ticks allowed before the processor blocks
    /// and asks the caller to rewind its clock.
    pub max_extrapolation_ticks: u32,

    /// Maximum buffered states. Inserts beyond this are refused once no
    /// stale entry can be evicted; the missing ack then drives the server's
    /// full-state fallback.
    pub capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            min_buffer_fill: 3,
            extrapolation: true,
            max_extrapolation_ticks: 5,
            capacity: 128,
        }
    }
}

impl ProcessorConfig {
    /// Creates a configuration suitable for testing with small windows.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            min_buffer_fill: 3,
            extrapolation: true,
            max_extrapolation_ticks: 3,
            capacity: 8,
        }
    }
}
