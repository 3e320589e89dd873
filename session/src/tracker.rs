//! Per-session acknowledgment state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use codec::{EntityId, Tick};
use pvs::Observer;
use registry::ComponentTypeId;

use crate::config::ProducerConfig;
use crate::error::{SessionError, SessionResult};

/// A connected client session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// The version map a session is known to hold, anchored at its last ack.
#[derive(Debug, Clone, Default)]
pub(crate) struct Baseline {
    pub(crate) tick: Tick,
    pub(crate) visible: BTreeSet<EntityId>,
    pub(crate) versions: BTreeMap<EntityId, BTreeMap<ComponentTypeId, u64>>,
}

/// Exactly what one produced state contained, kept until acked or dropped.
#[derive(Debug, Clone)]
pub(crate) struct SentRecord {
    pub(crate) visible: BTreeSet<EntityId>,
    pub(crate) versions: BTreeMap<EntityId, BTreeMap<ComponentTypeId, u64>>,
    pub(crate) full: bool,
}

#[derive(Debug)]
pub(crate) struct SessionEntry {
    pub(crate) observers: Vec<Observer>,
    pub(crate) forced: BTreeSet<EntityId>,
    pub(crate) baseline: Baseline,
    pub(crate) in_flight: BTreeMap<Tick, SentRecord>,
    pub(crate) needs_full: bool,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            observers: Vec::new(),
            forced: BTreeSet::new(),
            baseline: Baseline::default(),
            in_flight: BTreeMap::new(),
            needs_full: false,
        }
    }
}

/// All per-session replication state, owned explicitly by the caller.
///
/// Nothing here advances speculatively: a session's baseline moves only when
/// its acknowledgment for a remembered sent state arrives.
#[derive(Debug)]
pub struct SessionTracker {
    pub(crate) config: ProducerConfig,
    pub(crate) sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionTracker {
    /// Creates a tracker with the given production configuration.
    #[must_use]
    pub fn new(config: ProducerConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Returns the production configuration.
    #[must_use]
    pub const fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Returns the number of connected sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns `true` if the session is connected.
    #[must_use]
    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    /// Connects a session with empty state.
    ///
    /// A fresh session has baseline tick 0, so its first produced state is
    /// necessarily a full state. Reconnecting an existing id resets it.
    pub fn connect(&mut self, session: SessionId) {
        self.sessions.insert(session, SessionEntry::new());
    }

    /// Disconnects a session, dropping all of its state.
    pub fn disconnect(&mut self, session: SessionId) -> bool {
        self.sessions.remove(&session).is_some()
    }

    /// Replaces the session's observation points.
    ///
    /// Invalid observers are discarded; if none remain valid the previous
    /// observers are kept, so a mid-teleport observer degrades to its last
    /// known good position instead of blanking the visible set.
    pub fn set_observers(
        &mut self,
        session: SessionId,
        observers: &[Observer],
    ) -> SessionResult<()> {
        let entry = self.entry_mut(session)?;
        let valid: Vec<Observer> = observers
            .iter()
            .copied()
            .filter(Observer::is_valid)
            .collect();
        if valid.is_empty() && !observers.is_empty() {
            log::debug!(
                "session {}: all observers invalid, keeping last known good",
                session.0
            );
            return Ok(());
        }
        entry.observers = valid;
        Ok(())
    }

    /// Adds or removes a force-included entity (own pawn, global, ...).
    pub fn set_force_visible(
        &mut self,
        session: SessionId,
        entity: EntityId,
        forced: bool,
    ) -> SessionResult<()> {
        let entry = self.entry_mut(session)?;
        if forced {
            entry.forced.insert(entity);
        } else {
            entry.forced.remove(&entity);
        }
        Ok(())
    }

    /// Marks the session for a full-state resync.
    pub fn request_full(&mut self, session: SessionId) -> SessionResult<()> {
        let entry = self.entry_mut(session)?;
        entry.needs_full = true;
        entry.in_flight.clear();
        Ok(())
    }

    /// Returns the session's last acknowledged tick.
    pub fn acked_tick(&self, session: SessionId) -> SessionResult<Tick> {
        self.entry(session).map(|entry| entry.baseline.tick)
    }

    /// Processes a client acknowledgment for `tick`.
    ///
    /// Returns `true` if the baseline advanced. Acks for ticks outside the
    /// in-flight window are ignored: they are duplicates or refer to sends
    /// the window already dropped, which the force-full path covers.
    pub fn ack(&mut self, session: SessionId, tick: Tick) -> SessionResult<bool> {
        let entry = self.entry_mut(session)?;
        let Some(record) = entry.in_flight.get(&tick) else {
            return Ok(false);
        };

        entry.baseline = Baseline {
            tick,
            visible: record.visible.clone(),
            versions: record.versions.clone(),
        };
        if record.full {
            entry.needs_full = false;
        }
        entry.in_flight = entry.in_flight.split_off(&tick.next());
        Ok(true)
    }

    pub(crate) fn entry(&self, session: SessionId) -> SessionResult<&SessionEntry> {
        self.sessions
            .get(&session)
            .ok_or(SessionError::UnknownSession { session })
    }

    pub(crate) fn entry_mut(&mut self, session: SessionId) -> SessionResult<&mut SessionEntry> {
        self.sessions
            .get_mut(&session)
            .ok_or(SessionError::UnknownSession { session })
    }
}
