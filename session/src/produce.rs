//! Delta production: diffing the visible set against a session baseline.

use std::collections::{BTreeMap, BTreeSet};

use codec::{
    ComponentPayload, ComponentRemoval, ComponentUpdate, EntityEnter, EntityId, GameState, Tick,
};
use pvs::{SelectorConfig, SpatialIndex};
use store::StoreView;

use crate::config::ProducerConfig;
use crate::error::{SessionError, SessionResult};
use crate::tracker::{SentRecord, SessionEntry, SessionId, SessionTracker};

impl SessionTracker {
    /// Produces the state for `(session, tick)`, or `None` when there is
    /// nothing to send.
    ///
    /// The diff is always relative to the session's *acknowledged* baseline;
    /// producing a state records what was sent in the in-flight window but
    /// never advances the baseline itself. Budget truncation is
    /// deterministic, and truncated records stay outside the in-flight
    /// record so the unchanged baseline re-sends them on a later tick.
    pub fn produce(
        &mut self,
        session: SessionId,
        view: &StoreView<'_>,
        index: &SpatialIndex,
        selector: &SelectorConfig,
        tick: Tick,
        server_time_micros: u64,
    ) -> SessionResult<Option<GameState>> {
        let config = &self.config;
        let entry = self
            .sessions
            .get_mut(&session)
            .ok_or(SessionError::UnknownSession { session })?;

        let last_produced = entry.in_flight.last_key_value().map(|(tick, _)| *tick);
        if tick <= entry.baseline.tick || last_produced.is_some_and(|last| tick <= last) {
            log::warn!(
                "session {}: production tick {tick} is not ahead of {}, skipping",
                session.0,
                last_produced.unwrap_or(entry.baseline.tick),
            );
            return Ok(None);
        }

        if entry.in_flight.len() >= config.in_flight_window {
            log::warn!(
                "session {}: in-flight window overflow at tick {tick}, forcing full state",
                session.0
            );
            entry.in_flight.clear();
            entry.needs_full = true;
        }
        // A session is stalled when its oldest un-acked sent state has aged
        // past the timeout. An idle session with nothing outstanding is not
        // stalled, however long ago its last ack was.
        let stalled = entry
            .in_flight
            .keys()
            .next()
            .is_some_and(|oldest| tick.raw() - oldest.raw() > config.ack_timeout_ticks);
        if !entry.needs_full && stalled {
            log::warn!(
                "session {}: no ack since tick {}, forcing full state",
                session.0,
                entry.baseline.tick
            );
            entry.in_flight.clear();
            entry.needs_full = true;
        }

        let visible = index.visible_set(&entry.observers, &entry.forced, selector);

        let state = if entry.needs_full || entry.baseline.tick.is_zero() {
            Some(produce_full(
                entry,
                view,
                &visible,
                tick,
                server_time_micros,
                config,
            ))
        } else {
            produce_delta(entry, view, &visible, tick, server_time_micros, config)
        };
        Ok(state)
    }
}

fn produce_full(
    entry: &mut SessionEntry,
    view: &StoreView<'_>,
    visible: &[EntityId],
    tick: Tick,
    server_time_micros: u64,
    config: &ProducerConfig,
) -> GameState {
    let mut record = SentRecord {
        visible: BTreeSet::new(),
        versions: BTreeMap::new(),
        full: true,
    };
    let mut enters = Vec::new();
    let mut bytes_used = 0usize;

    for entity in visible.iter().copied() {
        if enters.len() >= config.max_enters_per_tick {
            break;
        }
        if !view.contains(entity) {
            continue;
        }
        let components = snapshot_components(view, entity);
        let entity_bytes: usize = components.iter().map(|c| c.payload.len()).sum();
        if bytes_used != 0 && bytes_used + entity_bytes > config.update_byte_budget {
            break;
        }
        bytes_used += entity_bytes;

        let versions: BTreeMap<_, _> = view
            .slots(entity)
            .map(|(component, slot)| (component, slot.version()))
            .collect();
        record.versions.insert(entity, versions);
        record.visible.insert(entity);
        enters.push(EntityEnter { entity, components });
    }

    enters.sort_by_key(|enter| enter.entity.raw());

    let mut state = GameState::full(tick, server_time_micros);
    state.enters = enters;
    entry.in_flight.insert(tick, record);
    state
}

fn produce_delta(
    entry: &mut SessionEntry,
    view: &StoreView<'_>,
    visible: &[EntityId],
    tick: Tick,
    server_time_micros: u64,
    config: &ProducerConfig,
) -> Option<GameState> {
    let visible_set: BTreeSet<EntityId> = visible.iter().copied().collect();
    let baseline = &entry.baseline;

    let mut record = SentRecord {
        visible: baseline.visible.clone(),
        versions: baseline.versions.clone(),
        full: false,
    };

    // An entity leaves when it drops out of the visible set, and also when
    // it died in the store while nominally still visible (despawn raced the
    // spatial index). Omission alone never communicates retirement.
    let leave_candidates: BTreeSet<EntityId> = baseline
        .visible
        .iter()
        .copied()
        .filter(|entity| !visible_set.contains(entity) || !view.contains(*entity))
        .collect();
    let leaves: Vec<EntityId> = leave_candidates
        .into_iter()
        .take(config.max_leaves_per_tick)
        .collect();
    for entity in &leaves {
        record.visible.remove(entity);
        record.versions.remove(entity);
    }

    let mut bytes_used = 0usize;
    let mut enters = Vec::new();
    for entity in visible.iter().copied() {
        if baseline.visible.contains(&entity) {
            continue;
        }
        if enters.len() >= config.max_enters_per_tick {
            break;
        }
        if !view.contains(entity) {
            continue;
        }
        let components = snapshot_components(view, entity);
        let entity_bytes: usize = components.iter().map(|c| c.payload.len()).sum();
        if bytes_used != 0 && bytes_used + entity_bytes > config.update_byte_budget {
            break;
        }
        bytes_used += entity_bytes;

        let versions: BTreeMap<_, _> = view
            .slots(entity)
            .map(|(component, slot)| (component, slot.version()))
            .collect();
        record.versions.insert(entity, versions);
        record.visible.insert(entity);
        enters.push(EntityEnter { entity, components });
    }

    let empty = BTreeMap::new();
    let mut updates = Vec::new();
    let mut removals = Vec::new();
    for entity in visible.iter().copied() {
        if !baseline.visible.contains(&entity) || !view.contains(entity) {
            continue;
        }
        let base_components = baseline.versions.get(&entity).unwrap_or(&empty);

        for (&component, _) in base_components {
            if view.slot(entity, component).is_none() {
                removals.push(ComponentRemoval { entity, component });
                if let Some(versions) = record.versions.get_mut(&entity) {
                    versions.remove(&component);
                }
            }
        }

        for (component, slot) in view.slots(entity) {
            let base_version = base_components.get(&component).copied().unwrap_or(0);
            if slot.version() <= base_version {
                continue;
            }
            let payload = slot.payload().to_vec();
            if bytes_used != 0 && bytes_used + payload.len() > config.update_byte_budget {
                continue;
            }
            bytes_used += payload.len();
            updates.push(ComponentUpdate {
                entity,
                component,
                payload,
            });
            record
                .versions
                .entry(entity)
                .or_default()
                .insert(component, slot.version());
        }
    }

    if enters.is_empty()
        && leaves.is_empty()
        && updates.is_empty()
        && removals.is_empty()
        && !config.heartbeat_when_empty
    {
        return None;
    }

    enters.sort_by_key(|enter| enter.entity.raw());
    updates.sort_by_key(|update| (update.entity.raw(), update.component.get()));
    removals.sort_by_key(|removal| (removal.entity.raw(), removal.component.get()));

    let mut state = GameState::delta(baseline.tick, tick, server_time_micros);
    state.enters = enters;
    state.leaves = leaves;
    state.updates = updates;
    state.removals = removals;
    entry.in_flight.insert(tick, record);
    Some(state)
}

fn snapshot_components(view: &StoreView<'_>, entity: EntityId) -> Vec<ComponentPayload> {
    view.slots(entity)
        .map(|(component, slot)| ComponentPayload {
            component,
            payload: slot.payload().to_vec(),
        })
        .collect()
}
