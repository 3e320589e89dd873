//! Tick-sequenced state buffering and the per-tick processing state machine.

use std::collections::BTreeMap;

use codec::{decode_state, CodecLimits, GameState, Tick};
use registry::Registry;

use crate::config::ProcessorConfig;

/// Observable processor state, one per render tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStatus {
    /// Not enough states received yet to safely begin.
    Buffering,
    /// Applying real states in sequence.
    Normal,
    /// Fabricating states while the real one is missing but recoverable.
    Extrapolating,
    /// Cannot proceed; waiting for retransmission or a full-state resync.
    Blocked,
}

/// The result of one [`StateProcessor::process_tick`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome<'a> {
    /// A real state was applied.
    ///
    /// `resync` is `Some(tick)` when a full state snapped the client clock
    /// to the server's authority; the caller must adopt it as its current
    /// tick. The applied `to_tick` must be acknowledged to the server.
    Applied {
        state: &'a GameState,
        resync: Option<Tick>,
    },

    /// No real state for this tick; hold/extrapolate `base` instead.
    ///
    /// Never advances the real-tick cursor and must never be acknowledged.
    Extrapolated { base: &'a GameState, tick: Tick },

    /// Still buffering; nothing can safely be produced yet.
    Waiting,

    /// No safe state exists. With `rewind_to` set, the caller must reset
    /// its clock backward to that tick instead of running ahead of data.
    Blocked { rewind_to: Option<Tick> },
}

impl TickOutcome<'_> {
    /// Returns the tick to report back to the server, if any.
    ///
    /// Only applied real states are acknowledged; extrapolated states would
    /// advance the server baseline past data the client never had.
    #[must_use]
    pub const fn ack(&self) -> Option<Tick> {
        match self {
            Self::Applied { state, .. } => Some(state.to_tick),
            _ => None,
        }
    }

    /// Returns `true` if a real state was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Reorders possibly-lost, possibly-duplicated states by tick and decides,
/// once per render tick, whether a real, an extrapolated, or no state can
/// be produced.
///
/// Only chain-valid states are ever applied: a delta applies exactly when
/// its `from_tick` equals the last applied real tick. Out-of-order or
/// duplicate delivery can therefore never corrupt the applied sequence.
#[derive(Debug)]
pub struct StateProcessor {
    config: ProcessorConfig,
    buffer: BTreeMap<u64, GameState>,
    last_real: Option<GameState>,
    last_processed_real_tick: Tick,
    started: bool,
    extrapolated_run: u32,
    status: ProcessorStatus,
}

impl StateProcessor {
    /// Creates a processor with the given configuration.
    #[must_use]
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            buffer: BTreeMap::new(),
            last_real: None,
            last_processed_real_tick: Tick::new(0),
            started: false,
            extrapolated_run: 0,
            status: ProcessorStatus::Buffering,
        }
    }

    /// Returns the current processor status.
    #[must_use]
    pub const fn status(&self) -> ProcessorStatus {
        self.status
    }

    /// Returns the tick of the last applied real state (0 before any).
    #[must_use]
    pub const fn last_processed_real_tick(&self) -> Tick {
        self.last_processed_real_tick
    }

    /// Returns the last applied real state, if any.
    #[must_use]
    pub const fn last_applied(&self) -> Option<&GameState> {
        self.last_real.as_ref()
    }

    /// Returns the number of buffered states.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes raw transport bytes and inserts the state.
    ///
    /// Malformed packets are dropped and logged; they never reach the
    /// buffer.
    pub fn ingest_bytes(
        &mut self,
        bytes: &[u8],
        registry: &Registry,
        wire_limits: &wire::Limits,
        limits: &CodecLimits,
    ) -> bool {
        match decode_state(registry, bytes, wire_limits, limits) {
            Ok(state) => self.insert(state),
            Err(err) => {
                log::warn!("dropping undecodable state packet: {err}");
                false
            }
        }
    }

    /// Inserts a decoded state into the buffer.
    ///
    /// Returns `false` when the state is rejected: stale (`to_tick` at or
    /// before the last applied real tick), tick-invalid, displaced by a
    /// buffered full state, or refused because the buffer is full of data
    /// still needed to bridge the chain.
    pub fn insert(&mut self, state: GameState) -> bool {
        if state.from_tick >= state.to_tick {
            log::warn!(
                "rejecting state with invalid tick range {}..{}",
                state.from_tick,
                state.to_tick
            );
            return false;
        }
        if state.to_tick <= self.last_processed_real_tick {
            log::debug!(
                "rejecting stale state {}..{} (last real tick {})",
                state.from_tick,
                state.to_tick,
                self.last_processed_real_tick
            );
            return false;
        }

        let key = state.to_tick.raw();
        if let Some(existing) = self.buffer.get(&key) {
            // Retransmission tie-break: most recently received wins, but a
            // buffered full state is never displaced by a delta.
            if existing.is_full() && !state.is_full() {
                log::debug!("keeping buffered full state for tick {}", state.to_tick);
                return false;
            }
            self.buffer.insert(key, state);
            return true;
        }

        if self.buffer.len() >= self.config.capacity {
            self.evict_stale();
        }
        if self.buffer.len() >= self.config.capacity {
            if state.is_full() {
                // A full state supersedes anything; make room by dropping
                // the oldest delta (or oldest entry if all are full).
                let victim = self
                    .buffer
                    .iter()
                    .find(|(_, buffered)| !buffered.is_full())
                    .map(|(tick, _)| *tick)
                    .or_else(|| self.buffer.keys().next().copied());
                if let Some(victim) = victim {
                    self.buffer.remove(&victim);
                }
            } else {
                log::warn!(
                    "state buffer full, refusing state {}..{}",
                    state.from_tick,
                    state.to_tick
                );
                return false;
            }
        }

        self.buffer.insert(key, state);
        true
    }

    /// Resolves the state for one render tick.
    ///
    /// Processing order: initial buffering gate, full-state escape hatch,
    /// exact chain match, extrapolation (only past the edge of buffered
    /// data), otherwise blocked; a hole is never skipped over.
    pub fn process_tick(&mut self, cur_tick: Tick) -> TickOutcome<'_> {
        let full_key = self
            .buffer
            .iter()
            .rev()
            .find(|(_, state)| state.is_full())
            .map(|(tick, _)| *tick);

        if !self.started && full_key.is_none() && self.buffer.len() < self.config.min_buffer_fill {
            self.status = ProcessorStatus::Buffering;
            return TickOutcome::Waiting;
        }

        // Full states resynchronize unconditionally, even when a chainable
        // delta exists for the current tick.
        if let Some(key) = full_key {
            if let Some(state) = self.buffer.remove(&key) {
                return self.apply(state, true);
            }
        }

        let chains = self
            .buffer
            .get(&cur_tick.raw())
            .is_some_and(|state| state.from_tick == self.last_processed_real_tick);
        if chains {
            if let Some(state) = self.buffer.remove(&cur_tick.raw()) {
                return self.apply(state, false);
            }
        }

        let highest = self.buffer.keys().next_back().copied();
        if highest.map_or(true, |tick| cur_tick.raw() > tick) {
            // Client clock is ahead of everything received.
            if self.config.extrapolation
                && self.extrapolated_run < self.config.max_extrapolation_ticks
                && self.last_real.is_some()
            {
                self.extrapolated_run += 1;
                self.status = ProcessorStatus::Extrapolating;
                if let Some(base) = self.last_real.as_ref() {
                    return TickOutcome::Extrapolated {
                        base,
                        tick: cur_tick,
                    };
                }
            }
            self.status = ProcessorStatus::Blocked;
            let rewind_to = self.started.then_some(self.last_processed_real_tick);
            return TickOutcome::Blocked { rewind_to };
        }

        // Future data exists but nothing chains from the last real state:
        // a hole. Wait for retransmission or a full-state resync.
        self.status = ProcessorStatus::Blocked;
        TickOutcome::Blocked { rewind_to: None }
    }

    fn apply(&mut self, state: GameState, resync: bool) -> TickOutcome<'_> {
        let to_tick = state.to_tick;
        self.buffer = self.buffer.split_off(&(to_tick.raw() + 1));
        self.last_processed_real_tick = to_tick;
        self.started = true;
        self.extrapolated_run = 0;
        self.status = ProcessorStatus::Normal;

        let applied = self.last_real.insert(state);
        TickOutcome::Applied {
            state: applied,
            resync: resync.then_some(to_tick),
        }
    }

    fn evict_stale(&mut self) {
        let cutoff = self.last_processed_real_tick.raw() + 1;
        let keep = self.buffer.split_off(&cutoff);
        for (_, state) in std::mem::replace(&mut self.buffer, keep) {
            log::debug!(
                "evicting stale buffered state {}..{}",
                state.from_tick,
                state.to_tick
            );
        }
    }
}
