use std::collections::BTreeSet;

use codec::{EntityId, GameState, Tick};
use pvs::{MapId, Observer, SelectorConfig, SpatialIndex, Vec2};
use registry::ComponentTypeId;
use session::{ProducerConfig, SessionId, SessionTracker};
use store::SnapshotStore;

const POSITION: u16 = 1;
const HEALTH: u16 = 2;

fn cid(value: u16) -> ComponentTypeId {
    ComponentTypeId::new(value).unwrap()
}

fn at(x: f32, y: f32) -> Vec2 {
    Vec2 { x, y }
}

struct Harness {
    store: SnapshotStore,
    index: SpatialIndex,
    tracker: SessionTracker,
    selector: SelectorConfig,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ProducerConfig::for_testing())
    }

    fn with_config(config: ProducerConfig) -> Self {
        let mut tracker = SessionTracker::new(config);
        tracker.connect(SessionId(1));
        tracker
            .set_observers(
                SessionId(1),
                &[Observer {
                    map: MapId(0),
                    pos: at(0.0, 0.0),
                    view_range: 20.0,
                }],
            )
            .unwrap();
        Self {
            store: SnapshotStore::new(),
            index: SpatialIndex::new(8.0),
            tracker,
            selector: SelectorConfig {
                overscan: 1.0,
                max_entities: 64,
            },
        }
    }

    fn spawn_at(&mut self, x: f32, y: f32) -> EntityId {
        let entity = self.store.spawn();
        self.store
            .set_component(entity, cid(POSITION), position_payload(x, y))
            .unwrap();
        self.index.update_entity(entity, MapId(0), at(x, y));
        entity
    }

    fn produce(&mut self, tick: u64) -> Option<GameState> {
        let view = self.store.view();
        self.tracker
            .produce(
                SessionId(1),
                &view,
                &self.index,
                &self.selector,
                Tick::new(tick),
                0,
            )
            .unwrap()
    }

    fn produce_and_ack(&mut self, tick: u64) -> GameState {
        let state = self.produce(tick).expect("state produced");
        assert!(self.tracker.ack(SessionId(1), state.to_tick).unwrap());
        state
    }
}

fn position_payload(x: f32, y: f32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&x.to_le_bytes());
    payload.extend_from_slice(&y.to_le_bytes());
    payload
}

#[test]
fn fresh_session_gets_full_state() {
    let mut harness = Harness::new();
    let a = harness.spawn_at(1.0, 0.0);
    let b = harness.spawn_at(2.0, 0.0);

    let state = harness.produce(1).unwrap();
    assert!(state.is_full());
    let entered: BTreeSet<EntityId> = state.enters.iter().map(|e| e.entity).collect();
    assert_eq!(entered, BTreeSet::from([a, b]));
    assert!(state.leaves.is_empty());
    assert!(state.updates.is_empty());
}

#[test]
fn production_does_not_advance_baseline() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);

    harness.produce(1).unwrap();
    harness.produce(2).unwrap();
    assert!(harness.tracker.acked_tick(SessionId(1)).unwrap().is_zero());
}

#[test]
fn unacked_states_repeat_against_acked_baseline() {
    let mut harness = Harness::new();
    let entity = harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    harness
        .store
        .set_component(entity, cid(HEALTH), vec![100])
        .unwrap();

    let first = harness.produce(2).unwrap();
    let second = harness.produce(3).unwrap();

    // Neither was acked, so both carry the same update relative to tick 1.
    assert_eq!(first.from_tick, Tick::new(1));
    assert_eq!(second.from_tick, Tick::new(1));
    assert_eq!(first.updates.len(), 1);
    assert_eq!(second.updates.len(), 1);
    assert_eq!(first.updates[0].payload, second.updates[0].payload);
}

#[test]
fn acked_update_is_not_resent() {
    let mut harness = Harness::new();
    let entity = harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    harness
        .store
        .set_component(entity, cid(HEALTH), vec![100])
        .unwrap();
    let state = harness.produce_and_ack(2);
    assert_eq!(state.updates.len(), 1);

    let next = harness.produce(3).unwrap();
    assert!(next.is_empty_diff(), "nothing changed since the ack");
    assert_eq!(next.from_tick, Tick::new(2));
}

#[test]
fn static_world_produces_empty_heartbeats() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    for tick in 2..6 {
        let state = harness.produce_and_ack(tick);
        assert!(state.is_empty_diff());
        assert!(!state.is_full());
    }
}

#[test]
fn empty_diffs_elided_when_heartbeat_disabled() {
    let mut config = ProducerConfig::for_testing();
    config.heartbeat_when_empty = false;
    let mut harness = Harness::with_config(config);
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    assert!(harness.produce(2).is_none());
}

#[test]
fn entity_movement_triggers_enter_and_leave() {
    let mut harness = Harness::new();
    let wanderer = harness.spawn_at(1.0, 0.0);
    harness.spawn_at(2.0, 0.0);
    harness.produce_and_ack(1);

    // Move the wanderer far out of view.
    harness
        .store
        .set_component(wanderer, cid(POSITION), position_payload(500.0, 0.0))
        .unwrap();
    harness.index.update_entity(wanderer, MapId(0), at(500.0, 0.0));

    let state = harness.produce_and_ack(2);
    assert_eq!(state.leaves, vec![wanderer]);
    assert!(state.enters.is_empty());

    // And back in.
    harness
        .store
        .set_component(wanderer, cid(POSITION), position_payload(1.0, 0.0))
        .unwrap();
    harness.index.update_entity(wanderer, MapId(0), at(1.0, 0.0));

    let state = harness.produce_and_ack(3);
    assert_eq!(state.enters.len(), 1);
    assert_eq!(state.enters[0].entity, wanderer);
    // Re-entering sends the full component snapshot again.
    assert_eq!(state.enters[0].components.len(), 1);
}

#[test]
fn despawn_is_replicated_as_leave() {
    let mut harness = Harness::new();
    let doomed = harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    harness.store.despawn(doomed).unwrap();
    harness.index.remove_entity(doomed);

    let state = harness.produce_and_ack(2);
    assert_eq!(state.leaves, vec![doomed]);
}

#[test]
fn component_detach_is_an_explicit_removal() {
    let mut harness = Harness::new();
    let entity = harness.spawn_at(1.0, 0.0);
    harness
        .store
        .set_component(entity, cid(HEALTH), vec![50])
        .unwrap();
    harness.produce_and_ack(1);

    harness.store.remove_component(entity, cid(HEALTH)).unwrap();

    let state = harness.produce_and_ack(2);
    assert_eq!(state.removals.len(), 1);
    assert_eq!(state.removals[0].entity, entity);
    assert_eq!(state.removals[0].component, cid(HEALTH));

    // Acked removal is gone from the baseline; nothing further to send.
    let next = harness.produce(3).unwrap();
    assert!(next.is_empty_diff());
}

#[test]
fn request_full_forces_full_state() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    harness.tracker.request_full(SessionId(1)).unwrap();
    let state = harness.produce(2).unwrap();
    assert!(state.is_full());
    assert_eq!(state.enters.len(), 1);

    // Full states repeat until one is acked.
    let again = harness.produce(3).unwrap();
    assert!(again.is_full());

    assert!(harness.tracker.ack(SessionId(1), Tick::new(3)).unwrap());
    let after = harness.produce(4).unwrap();
    assert!(!after.is_full());
}

#[test]
fn ack_timeout_degrades_to_full_states() {
    let mut config = ProducerConfig::for_testing();
    config.ack_timeout_ticks = 5;
    config.in_flight_window = 20;
    let mut harness = Harness::with_config(config);
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    // Heartbeats go out but none come back.
    for tick in 2..=6 {
        let state = harness.produce(tick).unwrap();
        assert!(!state.is_full());
    }

    // The oldest un-acked send (tick 2) is now past the timeout.
    let state = harness.produce(8).unwrap();
    assert!(state.is_full());
}

#[test]
fn idle_session_with_nothing_outstanding_never_times_out() {
    let mut config = ProducerConfig::for_testing();
    config.ack_timeout_ticks = 5;
    config.heartbeat_when_empty = false;
    let mut harness = Harness::with_config(config);
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    // Nothing changes, nothing is sent, nothing needs acking.
    for tick in 2..=20 {
        assert!(harness.produce(tick).is_none());
    }
}

#[test]
fn in_flight_overflow_degrades_to_full_states() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    // Window is 4: fill it without acking, the next produce goes full.
    for tick in 2..=5 {
        let state = harness.produce(tick).unwrap();
        assert!(!state.is_full());
    }
    let state = harness.produce(6).unwrap();
    assert!(state.is_full());
}

#[test]
fn enter_budget_defers_extra_entities() {
    let mut harness = Harness::new();
    // for_testing allows 4 enters per tick.
    let mut spawned = Vec::new();
    for i in 0..6 {
        spawned.push(harness.spawn_at(1.0 + i as f32, 0.0));
    }

    let first = harness.produce_and_ack(1);
    assert_eq!(first.enters.len(), 4);

    let second = harness.produce_and_ack(2);
    assert_eq!(second.enters.len(), 2);

    let all: BTreeSet<EntityId> = first
        .enters
        .iter()
        .chain(second.enters.iter())
        .map(|e| e.entity)
        .collect();
    assert_eq!(all, spawned.into_iter().collect::<BTreeSet<_>>());
}

#[test]
fn byte_budget_defers_updates() {
    let mut config = ProducerConfig::for_testing();
    config.update_byte_budget = 40;
    let mut harness = Harness::with_config(config);

    let a = harness.spawn_at(1.0, 0.0);
    let b = harness.spawn_at(2.0, 0.0);
    harness.produce_and_ack(1);

    // Two 32-byte payloads cannot both fit a 40-byte budget.
    harness
        .store
        .set_component(a, cid(HEALTH), vec![1; 32])
        .unwrap();
    harness
        .store
        .set_component(b, cid(HEALTH), vec![2; 32])
        .unwrap();

    let first = harness.produce_and_ack(2);
    assert_eq!(first.updates.len(), 1);

    let second = harness.produce_and_ack(3);
    assert_eq!(second.updates.len(), 1);
    assert_ne!(first.updates[0].entity, second.updates[0].entity);
}

#[test]
fn forced_entity_visible_from_anywhere() {
    let mut harness = Harness::new();
    let far = harness.spawn_at(900.0, 0.0);
    harness
        .tracker
        .set_force_visible(SessionId(1), far, true)
        .unwrap();

    let state = harness.produce(1).unwrap();
    assert_eq!(state.enters.len(), 1);
    assert_eq!(state.enters[0].entity, far);
}

#[test]
fn disconnect_drops_all_state() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(1);

    assert!(harness.tracker.disconnect(SessionId(1)));
    let view = harness.store.view();
    let err = harness
        .tracker
        .produce(
            SessionId(1),
            &view,
            &harness.index,
            &harness.selector,
            Tick::new(2),
            0,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        session::SessionError::UnknownSession { .. }
    ));
}

#[test]
fn stale_production_tick_is_skipped() {
    let mut harness = Harness::new();
    harness.spawn_at(1.0, 0.0);
    harness.produce_and_ack(5);

    assert!(harness.produce(5).is_none());
    assert!(harness.produce(3).is_none());
    assert!(harness.produce(6).is_some());
}
