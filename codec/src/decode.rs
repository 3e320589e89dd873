//! State decoding from wire packets.

use registry::{registry_hash, ComponentTypeId, Registry};
use wire::{decode_packet, ByteReader, SectionTag, WirePacket};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::state::{ComponentPayload, ComponentRemoval, ComponentUpdate, EntityEnter, GameState};
use crate::types::{EntityId, Tick};

/// Decodes a state from raw packet bytes.
pub fn decode_state(
    registry: &Registry,
    bytes: &[u8],
    wire_limits: &wire::Limits,
    limits: &CodecLimits,
) -> CodecResult<GameState> {
    let packet = decode_packet(bytes, wire_limits)?;
    decode_state_from_packet(registry, &packet, limits)
}

/// Decodes a state from a parsed wire packet.
pub fn decode_state_from_packet(
    registry: &Registry,
    packet: &WirePacket<'_>,
    limits: &CodecLimits,
) -> CodecResult<GameState> {
    let header = packet.header;
    let expected_hash = registry_hash(registry);
    if header.registry_hash != expected_hash {
        return Err(CodecError::RegistryMismatch {
            expected: expected_hash,
            found: header.registry_hash,
        });
    }

    let mut state = GameState::delta(
        Tick::new(header.from_tick),
        Tick::new(header.to_tick),
        header.server_time_micros,
    );

    let mut seen: Vec<SectionTag> = Vec::new();
    for section in &packet.sections {
        if seen.contains(&section.tag) {
            return Err(CodecError::DuplicateSection {
                section: section.tag,
            });
        }
        seen.push(section.tag);

        // A full state is self-sufficient: it may only carry enters (and
        // extra payload), never records that assume prior state.
        if state.is_full()
            && matches!(
                section.tag,
                SectionTag::EntityLeave
                    | SectionTag::ComponentUpdate
                    | SectionTag::ComponentRemove
            )
        {
            return Err(CodecError::UnexpectedSection {
                section: section.tag,
            });
        }

        match section.tag {
            SectionTag::EntityEnter => {
                state.enters = decode_enter_body(registry, section.body, limits)?;
            }
            SectionTag::EntityLeave => {
                state.leaves = decode_leave_body(section.body, limits)?;
            }
            SectionTag::ComponentUpdate => {
                state.updates = decode_update_body(registry, section.body, limits)?;
            }
            SectionTag::ComponentRemove => {
                state.removals = decode_removal_body(registry, section.body, limits)?;
            }
            SectionTag::ExtraPayload => {
                if section.body.len() > limits.max_extra_bytes {
                    return Err(CodecError::LimitsExceeded {
                        kind: LimitKind::ExtraBytes,
                        limit: limits.max_extra_bytes,
                        actual: section.body.len(),
                    });
                }
                state.extra_payload = section.body.to_vec();
            }
            _ => {
                return Err(CodecError::Wire(wire::DecodeError::UnknownSectionTag {
                    tag: section.tag as u8,
                }));
            }
        }
    }

    Ok(state)
}

fn decode_enter_body(
    registry: &Registry,
    body: &[u8],
    limits: &CodecLimits,
) -> CodecResult<Vec<EntityEnter>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_varu32()? as usize;
    if count > limits.max_enters {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::Enters,
            limit: limits.max_enters,
            actual: count,
        });
    }

    let mut enters = Vec::with_capacity(count);
    let mut prev_id: Option<u64> = None;
    for _ in 0..count {
        let raw_id = reader.read_u64()?;
        check_ascending_entity(&mut prev_id, raw_id)?;
        let entity = EntityId::from_raw(raw_id);

        let component_count = reader.read_varu32()? as usize;
        if component_count > limits.max_components_per_entity {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::ComponentsPerEntity,
                limit: limits.max_components_per_entity,
                actual: component_count,
            });
        }

        let mut components = Vec::with_capacity(component_count);
        let mut prev_comp: Option<u16> = None;
        for _ in 0..component_count {
            let (component, payload) = read_payload(registry, &mut reader)?;
            check_ascending_component(&mut prev_comp, raw_id, component.get())?;
            components.push(ComponentPayload {
                component,
                payload: payload.to_vec(),
            });
        }
        enters.push(EntityEnter { entity, components });
    }

    check_trailing(SectionTag::EntityEnter, &reader)?;
    Ok(enters)
}

fn decode_leave_body(body: &[u8], limits: &CodecLimits) -> CodecResult<Vec<EntityId>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_varu32()? as usize;
    if count > limits.max_leaves {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::Leaves,
            limit: limits.max_leaves,
            actual: count,
        });
    }

    let mut leaves = Vec::with_capacity(count);
    let mut prev_id: Option<u64> = None;
    for _ in 0..count {
        let raw_id = reader.read_u64()?;
        check_ascending_entity(&mut prev_id, raw_id)?;
        leaves.push(EntityId::from_raw(raw_id));
    }

    check_trailing(SectionTag::EntityLeave, &reader)?;
    Ok(leaves)
}

fn decode_update_body(
    registry: &Registry,
    body: &[u8],
    limits: &CodecLimits,
) -> CodecResult<Vec<ComponentUpdate>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_varu32()? as usize;
    if count > limits.max_updates {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::Updates,
            limit: limits.max_updates,
            actual: count,
        });
    }

    let mut updates = Vec::with_capacity(count);
    let mut prev: Option<(u64, u16)> = None;
    for _ in 0..count {
        let raw_id = reader.read_u64()?;
        let (component, payload) = read_payload(registry, &mut reader)?;
        check_ascending_record(&mut prev, raw_id, component.get())?;
        updates.push(ComponentUpdate {
            entity: EntityId::from_raw(raw_id),
            component,
            payload: payload.to_vec(),
        });
    }

    check_trailing(SectionTag::ComponentUpdate, &reader)?;
    Ok(updates)
}

fn decode_removal_body(
    registry: &Registry,
    body: &[u8],
    limits: &CodecLimits,
) -> CodecResult<Vec<ComponentRemoval>> {
    let mut reader = ByteReader::new(body);
    let count = reader.read_varu32()? as usize;
    if count > limits.max_removals {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::Removals,
            limit: limits.max_removals,
            actual: count,
        });
    }

    let mut removals = Vec::with_capacity(count);
    let mut prev: Option<(u64, u16)> = None;
    for _ in 0..count {
        let raw_id = reader.read_u64()?;
        let raw_comp = reader.read_u16()?;
        let component = lookup_component(registry, raw_comp)?;
        check_ascending_record(&mut prev, raw_id, raw_comp)?;
        removals.push(ComponentRemoval {
            entity: EntityId::from_raw(raw_id),
            component,
        });
    }

    check_trailing(SectionTag::ComponentRemove, &reader)?;
    Ok(removals)
}

fn read_payload<'a>(
    registry: &Registry,
    reader: &mut ByteReader<'a>,
) -> CodecResult<(ComponentTypeId, &'a [u8])> {
    let raw_comp = reader.read_u16()?;
    let component = lookup_component(registry, raw_comp)?;
    let def = registry
        .get(component)
        .ok_or(CodecError::UnknownComponent { raw: raw_comp })?;
    let len = reader.read_varu32()? as usize;
    if len > def.max_payload_bytes {
        return Err(CodecError::PayloadTooLarge {
            component: raw_comp,
            len,
            max: def.max_payload_bytes,
        });
    }
    let payload = reader.read_bytes(len)?;
    Ok((component, payload))
}

fn lookup_component(registry: &Registry, raw: u16) -> CodecResult<ComponentTypeId> {
    let component =
        ComponentTypeId::new(raw).ok_or(CodecError::UnknownComponent { raw })?;
    if !registry.contains(component) {
        return Err(CodecError::UnknownComponent { raw });
    }
    Ok(component)
}

fn check_trailing(section: SectionTag, reader: &ByteReader<'_>) -> CodecResult<()> {
    if !reader.is_empty() {
        return Err(CodecError::TrailingSectionData {
            section,
            remaining: reader.remaining(),
        });
    }
    Ok(())
}

fn check_ascending_entity(prev: &mut Option<u64>, current: u64) -> CodecResult<()> {
    if let Some(previous) = *prev {
        if current <= previous {
            return Err(CodecError::InvalidEntityOrder { previous, current });
        }
    }
    *prev = Some(current);
    Ok(())
}

fn check_ascending_component(prev: &mut Option<u16>, entity: u64, current: u16) -> CodecResult<()> {
    if let Some(previous) = *prev {
        if current <= previous {
            return Err(CodecError::InvalidComponentOrder {
                entity,
                previous,
                current,
            });
        }
    }
    *prev = Some(current);
    Ok(())
}

fn check_ascending_record(
    prev: &mut Option<(u64, u16)>,
    entity: u64,
    component: u16,
) -> CodecResult<()> {
    let current = (entity, component);
    if let Some(previous) = *prev {
        if current <= previous {
            if current.0 < previous.0 {
                return Err(CodecError::InvalidEntityOrder {
                    previous: previous.0,
                    current: current.0,
                });
            }
            return Err(CodecError::InvalidComponentOrder {
                entity,
                previous: previous.1,
                current: component,
            });
        }
    }
    *prev = Some(current);
    Ok(())
}
