//! Deterministic end-to-end simulation of the tickrep pipeline.
//!
//! A seeded world of wandering entities is replicated to one or more
//! sessions across a configurable lossy/duplicating/reordering link, and
//! each client's mirror is checked against the server's visible state after
//! the link settles.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use client::{apply_state, ProcessorConfig, StateProcessor, StateSink, TickOutcome};
use codec::{encode_state, CodecLimits, EntityId, Tick};
use pvs::{MapId, Observer, SelectorConfig, SpatialIndex, Vec2};
use registry::{ComponentDef, ComponentTypeId, Registry};
use serde::Serialize;
use session::{ProducerConfig, SessionId, SessionTracker};
use store::SnapshotStore;

const POSITION: u16 = 1;
const HEALTH: u16 = 2;

fn cid(value: u16) -> ComponentTypeId {
    ComponentTypeId::new(value).expect("non-zero component id")
}

/// The component registry both endpoints agree on.
#[must_use]
pub fn sim_registry() -> Registry {
    Registry::builder()
        .component(ComponentDef::new(cid(POSITION), "position").max_payload(16))
        .component(ComponentDef::new(cid(HEALTH), "health").max_payload(4))
        .build()
        .expect("valid registry")
}

/// Deterministic LCG, seeded per run.
pub struct Rng {
    state: u64,
}

impl Rng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    pub fn percent(&mut self) -> u8 {
        (self.next_u32() % 100) as u8
    }

    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        let unit = (self.next_u32() % 10_000) as f32 / 10_000.0;
        min + (max - min) * unit
    }
}

/// Loss/duplication/reordering knobs for the simulated link.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkConfig {
    pub loss_percent: u8,
    pub duplicate_percent: u8,
    pub reorder_percent: u8,
}

impl LinkConfig {
    #[must_use]
    pub const fn lossless() -> Self {
        Self {
            loss_percent: 0,
            duplicate_percent: 0,
            reorder_percent: 0,
        }
    }
}

/// One-way unreliable link: packets may vanish, double, or swap with the
/// next send.
struct LossyLink {
    config: LinkConfig,
    held: Option<Vec<u8>>,
}

impl LossyLink {
    const fn new(config: LinkConfig) -> Self {
        Self { config, held: None }
    }

    fn send(&mut self, packet: Vec<u8>, rng: &mut Rng, stats: &mut Summary) -> Vec<Vec<u8>> {
        let mut delivered = Vec::new();
        if rng.percent() < self.config.loss_percent {
            stats.packets_dropped += 1;
            delivered.extend(self.held.take());
            return delivered;
        }
        if rng.percent() < self.config.reorder_percent && self.held.is_none() {
            // Hold this packet back one tick; it arrives after the next one.
            self.held = Some(packet);
            return delivered;
        }
        if rng.percent() < self.config.duplicate_percent {
            stats.packets_duplicated += 1;
            delivered.push(packet.clone());
        }
        delivered.push(packet);
        delivered.extend(self.held.take());
        delivered
    }

    fn flush(&mut self) -> Vec<Vec<u8>> {
        self.held.take().into_iter().collect()
    }
}

/// Client-side mirror of replicated entity state.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Mirror {
    pub entities: BTreeMap<EntityId, BTreeMap<ComponentTypeId, Vec<u8>>>,
}

impl StateSink for Mirror {
    fn enter(&mut self, entity: EntityId, component: ComponentTypeId, payload: &[u8]) {
        self.entities
            .entry(entity)
            .or_default()
            .insert(component, payload.to_vec());
    }

    fn update(&mut self, entity: EntityId, component: ComponentTypeId, payload: &[u8]) {
        self.entities
            .entry(entity)
            .or_default()
            .insert(component, payload.to_vec());
    }

    fn remove(&mut self, entity: EntityId, component: ComponentTypeId) {
        if let Some(components) = self.entities.get_mut(&entity) {
            components.remove(&component);
        }
    }

    fn leave(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
    }
}

/// Simulation parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    pub entities: u32,
    pub sessions: u32,
    pub ticks: u64,
    pub settle_ticks: u64,
    pub seed: u64,
    pub link: LinkConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            entities: 32,
            sessions: 2,
            ticks: 300,
            settle_ticks: 30,
            seed: 1,
            link: LinkConfig {
                loss_percent: 10,
                duplicate_percent: 5,
                reorder_percent: 5,
            },
        }
    }
}

/// Aggregate run statistics.
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub sessions: u32,
    pub entities: u32,
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_duplicated: u64,
    pub bytes_sent: u64,
    pub full_states: u64,
    pub delta_states: u64,
    pub applied: u64,
    pub extrapolated: u64,
    pub blocked: u64,
    pub waiting: u64,
    pub resyncs: u64,
    pub avg_state_bytes: u64,
    pub converged_sessions: u32,
}

struct ClientEnd {
    session: SessionId,
    observer: Observer,
    processor: StateProcessor,
    mirror: Mirror,
    clock: u64,
    link: LossyLink,
}

struct WorldEntity {
    id: EntityId,
    pos: Vec2,
}

/// Runs the full pipeline simulation and returns its statistics.
pub fn run(config: &SimConfig) -> Result<Summary> {
    let registry = sim_registry();
    let codec_limits = CodecLimits::default();
    let wire_limits = wire::Limits::default();
    let selector = SelectorConfig::default();

    let mut rng = Rng::new(config.seed);
    let mut store = SnapshotStore::new();
    let mut index = SpatialIndex::new(8.0);
    let mut tracker = SessionTracker::new(ProducerConfig::default());
    let mut summary = Summary {
        ticks: config.ticks + config.settle_ticks,
        sessions: config.sessions,
        entities: config.entities,
        ..Summary::default()
    };

    let mut world: Vec<WorldEntity> = Vec::with_capacity(config.entities as usize);
    for _ in 0..config.entities {
        let pos = Vec2 {
            x: rng.range_f32(-60.0, 60.0),
            y: rng.range_f32(-60.0, 60.0),
        };
        let id = store.spawn();
        store.set_component(id, cid(POSITION), position_payload(pos))?;
        store.set_component(id, cid(HEALTH), vec![100])?;
        index.update_entity(id, MapId(0), pos);
        world.push(WorldEntity { id, pos });
    }

    let mut clients: Vec<ClientEnd> = Vec::with_capacity(config.sessions as usize);
    for i in 0..config.sessions {
        let session = SessionId(u64::from(i) + 1);
        let observer = Observer {
            map: MapId(0),
            pos: Vec2 {
                x: rng.range_f32(-40.0, 40.0),
                y: rng.range_f32(-40.0, 40.0),
            },
            view_range: 32.0,
        };
        tracker.connect(session);
        tracker.set_observers(session, &[observer])?;
        clients.push(ClientEnd {
            session,
            observer,
            processor: StateProcessor::new(ProcessorConfig::default()),
            mirror: Mirror::default(),
            clock: 0,
            link: LossyLink::new(config.link),
        });
    }

    let total_ticks = config.ticks + config.settle_ticks;
    for tick in 1..=total_ticks {
        if tick <= config.ticks {
            step_world(&mut world, &mut store, &mut index, &mut rng)?;
        }

        let view = store.view();
        for end in &mut clients {
            let produced = tracker.produce(
                end.session,
                &view,
                &index,
                &selector,
                Tick::new(tick),
                tick * 1_000,
            )?;

            let mut incoming: Vec<Vec<u8>> = Vec::new();
            if let Some(state) = produced {
                if state.is_full() {
                    summary.full_states += 1;
                } else {
                    summary.delta_states += 1;
                }
                let mut buf = vec![0u8; wire_limits.max_packet_bytes];
                let len = encode_state(&registry, &state, &codec_limits, &mut buf)?;
                summary.packets_sent += 1;
                summary.bytes_sent += len as u64;
                buf.truncate(len);
                let settled = tick > config.ticks;
                incoming = if settled {
                    // The settle phase runs lossless so the run can converge.
                    let mut packets = end.link.flush();
                    packets.push(buf);
                    packets
                } else {
                    end.link.send(buf, &mut rng, &mut summary)
                };
            }

            for packet in incoming {
                end.processor
                    .ingest_bytes(&packet, &registry, &wire_limits, &codec_limits);
            }

            let cur = end.clock + 1;
            match end.processor.process_tick(Tick::new(cur)) {
                TickOutcome::Applied { state, resync } => {
                    summary.applied += 1;
                    if resync.is_some() {
                        summary.resyncs += 1;
                    }
                    if state.is_full() {
                        end.mirror.entities.clear();
                    }
                    apply_state(state, &mut end.mirror);
                    let acked = state.to_tick;
                    end.clock = acked.raw();
                    tracker.ack(end.session, acked)?;
                }
                TickOutcome::Extrapolated { .. } => {
                    summary.extrapolated += 1;
                    end.clock = cur;
                }
                TickOutcome::Waiting => summary.waiting += 1,
                TickOutcome::Blocked { rewind_to } => {
                    summary.blocked += 1;
                    // A rewind snaps the clock back; a plain hole lets the
                    // render clock keep marching toward the buffered data.
                    end.clock = rewind_to.map_or(cur, Tick::raw);
                }
            }
        }
    }

    if summary.packets_sent > 0 {
        summary.avg_state_bytes = summary.bytes_sent / summary.packets_sent;
    }

    let view = store.view();
    for end in &clients {
        let expected: BTreeMap<EntityId, BTreeMap<ComponentTypeId, Vec<u8>>> = index
            .visible_set(&[end.observer], &BTreeSet::new(), &selector)
            .into_iter()
            .map(|entity| {
                let components = view
                    .slots(entity)
                    .map(|(component, slot)| (component, slot.payload().to_vec()))
                    .collect();
                (entity, components)
            })
            .collect();
        if end.mirror.entities == expected {
            summary.converged_sessions += 1;
        }
    }

    if summary.converged_sessions != config.sessions {
        bail!(
            "{} of {} sessions failed to converge",
            config.sessions - summary.converged_sessions,
            config.sessions
        );
    }
    Ok(summary)
}

fn step_world(
    world: &mut [WorldEntity],
    store: &mut SnapshotStore,
    index: &mut SpatialIndex,
    rng: &mut Rng,
) -> Result<()> {
    for entity in world.iter_mut() {
        if rng.percent() < 60 {
            entity.pos.x = (entity.pos.x + rng.range_f32(-1.5, 1.5)).clamp(-80.0, 80.0);
            entity.pos.y = (entity.pos.y + rng.range_f32(-1.5, 1.5)).clamp(-80.0, 80.0);
            store.set_component(entity.id, cid(POSITION), position_payload(entity.pos))?;
            index.update_entity(entity.id, MapId(0), entity.pos);
        }
        if rng.percent() < 5 {
            let health = (rng.next_u32() % 100) as u8 + 1;
            store.set_component(entity.id, cid(HEALTH), vec![health])?;
        }
    }
    Ok(())
}

fn position_payload(pos: Vec2) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&pos.x.to_le_bytes());
    payload.extend_from_slice(&pos.y.to_le_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_run_converges() {
        let config = SimConfig {
            entities: 8,
            sessions: 1,
            ticks: 40,
            settle_ticks: 10,
            seed: 7,
            link: LinkConfig::lossless(),
        };
        let summary = run(&config).unwrap();
        assert_eq!(summary.converged_sessions, 1);
        assert_eq!(summary.packets_dropped, 0);
    }

    #[test]
    fn lossy_run_converges_after_settling() {
        let config = SimConfig {
            entities: 12,
            sessions: 2,
            ticks: 120,
            settle_ticks: 40,
            seed: 3,
            link: LinkConfig {
                loss_percent: 20,
                duplicate_percent: 10,
                reorder_percent: 10,
            },
        };
        let summary = run(&config).unwrap();
        assert_eq!(summary.converged_sessions, 2);
        assert!(summary.packets_dropped > 0);
    }

    #[test]
    fn same_seed_same_summary_bytes() {
        let config = SimConfig::default();
        let a = run(&config).unwrap();
        let b = run(&config).unwrap();
        assert_eq!(a.bytes_sent, b.bytes_sent);
        assert_eq!(a.applied, b.applied);
    }
}
