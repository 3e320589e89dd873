//! State encoding into wire packets.

use registry::{registry_hash, ComponentTypeId, Registry};
use wire::{encode_header, encode_section, ByteWriter, PacketHeader, SectionTag};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::state::{EntityEnter, GameState};
use crate::types::EntityId;

/// Encodes a state into the provided output buffer.
///
/// Entities and components must be in strictly ascending id order; the
/// producer emits them that way and the encoder rejects anything else so
/// every encoding of a given state is byte-identical.
pub fn encode_state(
    registry: &Registry,
    state: &GameState,
    limits: &CodecLimits,
    out: &mut [u8],
) -> CodecResult<usize> {
    if state.from_tick >= state.to_tick {
        return Err(CodecError::InvalidTickRange {
            from_tick: state.from_tick.raw(),
            to_tick: state.to_tick.raw(),
        });
    }
    check_limit(LimitKind::Enters, state.enters.len(), limits.max_enters)?;
    check_limit(LimitKind::Leaves, state.leaves.len(), limits.max_leaves)?;
    check_limit(LimitKind::Updates, state.updates.len(), limits.max_updates)?;
    check_limit(
        LimitKind::Removals,
        state.removals.len(),
        limits.max_removals,
    )?;
    check_limit(
        LimitKind::ExtraBytes,
        state.extra_payload.len(),
        limits.max_extra_bytes,
    )?;

    let mut offset = wire::HEADER_SIZE;
    if out.len() < offset {
        return Err(CodecError::OutputTooSmall {
            needed: offset,
            available: out.len(),
        });
    }

    if !state.enters.is_empty() {
        let body = encode_enter_body(registry, &state.enters, limits)?;
        offset += write_section(SectionTag::EntityEnter, &body, &mut out[offset..])?;
    }
    if !state.leaves.is_empty() {
        let body = encode_leave_body(&state.leaves)?;
        offset += write_section(SectionTag::EntityLeave, &body, &mut out[offset..])?;
    }
    if !state.updates.is_empty() {
        let body = encode_update_body(registry, state)?;
        offset += write_section(SectionTag::ComponentUpdate, &body, &mut out[offset..])?;
    }
    if !state.removals.is_empty() {
        let body = encode_removal_body(registry, state)?;
        offset += write_section(SectionTag::ComponentRemove, &body, &mut out[offset..])?;
    }
    if !state.extra_payload.is_empty() {
        offset += write_section(
            SectionTag::ExtraPayload,
            &state.extra_payload,
            &mut out[offset..],
        )?;
    }

    let payload_len = (offset - wire::HEADER_SIZE) as u32;
    let hash = registry_hash(registry);
    let header = if state.is_full() {
        PacketHeader::full_state(
            hash,
            state.to_tick.raw(),
            state.server_time_micros,
            payload_len,
        )
    } else {
        PacketHeader::delta_state(
            hash,
            state.from_tick.raw(),
            state.to_tick.raw(),
            state.server_time_micros,
            payload_len,
        )
    };
    encode_header(&header, &mut out[..wire::HEADER_SIZE]).map_err(|_| {
        CodecError::OutputTooSmall {
            needed: wire::HEADER_SIZE,
            available: out.len(),
        }
    })?;

    Ok(offset)
}

fn encode_enter_body(
    registry: &Registry,
    enters: &[EntityEnter],
    limits: &CodecLimits,
) -> CodecResult<Vec<u8>> {
    let mut writer = ByteWriter::new();
    writer.write_varu32(enters.len() as u32);

    let mut prev_id: Option<u64> = None;
    for enter in enters {
        check_entity_order(&mut prev_id, enter.entity)?;
        check_limit(
            LimitKind::ComponentsPerEntity,
            enter.components.len(),
            limits.max_components_per_entity,
        )?;

        writer.write_u64(enter.entity.raw());
        writer.write_varu32(enter.components.len() as u32);

        let mut prev_comp: Option<u16> = None;
        for component in &enter.components {
            check_component_order(&mut prev_comp, enter.entity, component.component.get())?;
            write_payload(registry, &mut writer, component.component, &component.payload)?;
        }
    }
    Ok(writer.finish())
}

fn encode_leave_body(leaves: &[EntityId]) -> CodecResult<Vec<u8>> {
    let mut writer = ByteWriter::new();
    writer.write_varu32(leaves.len() as u32);

    let mut prev_id: Option<u64> = None;
    for leave in leaves {
        check_entity_order(&mut prev_id, *leave)?;
        writer.write_u64(leave.raw());
    }
    Ok(writer.finish())
}

fn encode_update_body(registry: &Registry, state: &GameState) -> CodecResult<Vec<u8>> {
    let mut writer = ByteWriter::new();
    writer.write_varu32(state.updates.len() as u32);

    let mut prev: Option<(u64, u16)> = None;
    for update in &state.updates {
        check_record_order(&mut prev, update.entity, update.component.get())?;
        writer.write_u64(update.entity.raw());
        write_payload(registry, &mut writer, update.component, &update.payload)?;
    }
    Ok(writer.finish())
}

fn encode_removal_body(registry: &Registry, state: &GameState) -> CodecResult<Vec<u8>> {
    let mut writer = ByteWriter::new();
    writer.write_varu32(state.removals.len() as u32);

    let mut prev: Option<(u64, u16)> = None;
    for removal in &state.removals {
        check_record_order(&mut prev, removal.entity, removal.component.get())?;
        if registry.get(removal.component).is_none() {
            return Err(CodecError::UnknownComponent {
                raw: removal.component.get(),
            });
        }
        writer.write_u64(removal.entity.raw());
        writer.write_u16(removal.component.get());
    }
    Ok(writer.finish())
}

fn write_payload(
    registry: &Registry,
    writer: &mut ByteWriter,
    component: ComponentTypeId,
    payload: &[u8],
) -> CodecResult<()> {
    let def = registry
        .get(component)
        .ok_or(CodecError::UnknownComponent {
            raw: component.get(),
        })?;
    if payload.len() > def.max_payload_bytes {
        return Err(CodecError::PayloadTooLarge {
            component: component.get(),
            len: payload.len(),
            max: def.max_payload_bytes,
        });
    }
    writer.write_u16(component.get());
    writer.write_varu32(payload.len() as u32);
    writer.write_bytes(payload);
    Ok(())
}

fn write_section(tag: SectionTag, body: &[u8], out: &mut [u8]) -> CodecResult<usize> {
    encode_section(tag, body, out).map_err(|err| match err {
        wire::EncodeError::BufferTooSmall { needed, available } => {
            CodecError::OutputTooSmall { needed, available }
        }
        wire::EncodeError::LengthOverflow { length } => CodecError::OutputTooSmall {
            needed: length,
            available: out.len(),
        },
    })
}

fn check_limit(kind: LimitKind, actual: usize, limit: usize) -> CodecResult<()> {
    if actual > limit {
        return Err(CodecError::LimitsExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}

fn check_entity_order(prev: &mut Option<u64>, entity: EntityId) -> CodecResult<()> {
    if let Some(previous) = *prev {
        if entity.raw() <= previous {
            return Err(CodecError::InvalidEntityOrder {
                previous,
                current: entity.raw(),
            });
        }
    }
    *prev = Some(entity.raw());
    Ok(())
}

fn check_component_order(prev: &mut Option<u16>, entity: EntityId, component: u16) -> CodecResult<()> {
    if let Some(previous) = *prev {
        if component <= previous {
            return Err(CodecError::InvalidComponentOrder {
                entity: entity.raw(),
                previous,
                current: component,
            });
        }
    }
    *prev = Some(component);
    Ok(())
}

fn check_record_order(
    prev: &mut Option<(u64, u16)>,
    entity: EntityId,
    component: u16,
) -> CodecResult<()> {
    let current = (entity.raw(), component);
    if let Some(previous) = *prev {
        if current <= previous {
            if current.0 < previous.0 {
                return Err(CodecError::InvalidEntityOrder {
                    previous: previous.0,
                    current: current.0,
                });
            }
            return Err(CodecError::InvalidComponentOrder {
                entity: entity.raw(),
                previous: previous.1,
                current: component,
            });
        }
    }
    *prev = Some(current);
    Ok(())
}
