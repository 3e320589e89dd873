//! Packet decoding and section framing.

use crate::bytes::{ByteError, ByteReader, ByteWriter};
use crate::error::{DecodeError, EncodeError, LimitKind, SectionFramingError, WireResult};
use crate::header::{PacketFlags, PacketHeader, HEADER_SIZE, MAGIC, VERSION};
use crate::limits::Limits;

/// Section tags for version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[repr(u8)]
pub enum SectionTag {
    EntityEnter = 1,
    EntityLeave = 2,
    ComponentUpdate = 3,
    ComponentRemove = 4,
    ExtraPayload = 5,
}

impl SectionTag {
    /// Parses a section tag from a raw byte.
    pub fn parse(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            1 => Ok(Self::EntityEnter),
            2 => Ok(Self::EntityLeave),
            3 => Ok(Self::ComponentUpdate),
            4 => Ok(Self::ComponentRemove),
            5 => Ok(Self::ExtraPayload),
            _ => Err(DecodeError::UnknownSectionTag { tag }),
        }
    }
}

/// A section within a wire packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireSection<'a> {
    pub tag: SectionTag,
    pub body: &'a [u8],
}

/// A decoded wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePacket<'a> {
    pub header: PacketHeader,
    pub sections: Vec<WireSection<'a>>,
}

/// Decodes a wire packet into header + section slices.
pub fn decode_packet<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<WirePacket<'a>> {
    if buf.len() < HEADER_SIZE {
        return Err(DecodeError::PacketTooSmall {
            actual: buf.len(),
            required: HEADER_SIZE,
        });
    }
    if buf.len() > limits.max_packet_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::PacketBytes,
            limit: limits.max_packet_bytes,
            actual: buf.len(),
        });
    }

    let mut reader = ByteReader::new(buf);
    let magic = reader.read_u32().map_err(framing)?;
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }

    let version = reader.read_u16().map_err(framing)?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }

    let flags_raw = reader.read_u16().map_err(framing)?;
    let flags = PacketFlags::from_raw(flags_raw);
    if !flags.is_valid() {
        return Err(DecodeError::InvalidFlags { flags: flags_raw });
    }

    let registry_hash = reader.read_u64().map_err(framing)?;
    let from_tick = reader.read_u64().map_err(framing)?;
    let to_tick = reader.read_u64().map_err(framing)?;
    let server_time_micros = reader.read_u64().map_err(framing)?;
    let payload_len = reader.read_u32().map_err(framing)?;

    if from_tick >= to_tick {
        return Err(DecodeError::InvalidTickRange {
            from_tick,
            to_tick,
            flags: flags_raw,
        });
    }
    if flags.is_full_state() && from_tick != 0 {
        return Err(DecodeError::InvalidTickRange {
            from_tick,
            to_tick,
            flags: flags_raw,
        });
    }
    if flags.is_delta_state() && from_tick == 0 {
        return Err(DecodeError::InvalidTickRange {
            from_tick,
            to_tick,
            flags: flags_raw,
        });
    }

    let actual_payload_len = buf.len() - HEADER_SIZE;
    if payload_len as usize != actual_payload_len {
        return Err(DecodeError::PayloadLengthMismatch {
            header_len: payload_len,
            actual_len: actual_payload_len,
        });
    }

    let header = PacketHeader {
        version,
        flags,
        registry_hash,
        from_tick,
        to_tick,
        server_time_micros,
        payload_len,
    };

    let payload = &buf[HEADER_SIZE..];
    let sections = decode_sections(payload, limits)?;

    Ok(WirePacket { header, sections })
}

/// Decodes sections from a payload buffer (no packet header).
pub fn decode_sections<'a>(payload: &'a [u8], limits: &Limits) -> WireResult<Vec<WireSection<'a>>> {
    let mut reader = ByteReader::new(payload);
    let mut sections = Vec::new();

    while !reader.is_empty() {
        if sections.len() >= limits.max_sections {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionCount,
                limit: limits.max_sections,
                actual: sections.len() + 1,
            });
        }

        let tag = reader.read_u8().map_err(framing)?;
        let len = reader.read_varu32().map_err(framing)?;
        let len = usize::try_from(len).map_err(|_| {
            DecodeError::SectionFraming(SectionFramingError::InvalidVarint)
        })?;

        if len > limits.max_section_len {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                limit: limits.max_section_len,
                actual: len,
            });
        }

        let tag = SectionTag::parse(tag)?;
        let body = reader.read_bytes(len).map_err(framing)?;
        sections.push(WireSection { tag, body });
    }

    Ok(sections)
}

/// Encodes a packet header into the provided output buffer.
pub fn encode_header(header: &PacketHeader, out: &mut [u8]) -> Result<usize, EncodeError> {
    if out.len() < HEADER_SIZE {
        return Err(EncodeError::BufferTooSmall {
            needed: HEADER_SIZE,
            available: out.len(),
        });
    }

    out[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    out[4..6].copy_from_slice(&header.version.to_le_bytes());
    out[6..8].copy_from_slice(&header.flags.raw().to_le_bytes());
    out[8..16].copy_from_slice(&header.registry_hash.to_le_bytes());
    out[16..24].copy_from_slice(&header.from_tick.to_le_bytes());
    out[24..32].copy_from_slice(&header.to_tick.to_le_bytes());
    out[32..40].copy_from_slice(&header.server_time_micros.to_le_bytes());
    out[40..44].copy_from_slice(&header.payload_len.to_le_bytes());

    Ok(HEADER_SIZE)
}

/// Encodes a single section into the provided output buffer.
pub fn encode_section(tag: SectionTag, body: &[u8], out: &mut [u8]) -> Result<usize, EncodeError> {
    let len_u32 = u32::try_from(body.len())
        .map_err(|_| EncodeError::LengthOverflow { length: body.len() })?;
    let mut framing = ByteWriter::with_capacity(6);
    framing.write_u8(tag as u8);
    framing.write_varu32(len_u32);
    let prefix = framing.finish();

    let needed = prefix.len() + body.len();
    if out.len() < needed {
        return Err(EncodeError::BufferTooSmall {
            needed,
            available: out.len(),
        });
    }

    out[..prefix.len()].copy_from_slice(&prefix);
    out[prefix.len()..needed].copy_from_slice(body);
    Ok(needed)
}

const fn framing(err: ByteError) -> DecodeError {
    match err {
        ByteError::UnexpectedEof {
            requested,
            available,
        } => DecodeError::SectionFraming(SectionFramingError::Truncated {
            needed: requested,
            available,
        }),
        ByteError::InvalidVarint => DecodeError::SectionFraming(SectionFramingError::InvalidVarint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_header(payload_len: u32) -> PacketHeader {
        PacketHeader::full_state(0xABCD, 42, 0, payload_len)
    }

    #[test]
    fn encode_header_roundtrip_empty_payload() {
        let header = full_header(0);
        let mut buf = [0u8; HEADER_SIZE];
        let written = encode_header(&header, &mut buf).unwrap();
        assert_eq!(written, HEADER_SIZE);

        let limits = Limits::for_testing();
        let packet = decode_packet(&buf, &limits).unwrap();
        assert_eq!(packet.header, header);
        assert!(packet.sections.is_empty());
    }

    #[test]
    fn decode_rejects_invalid_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&full_header(0), &mut buf).unwrap();
        buf[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidMagic { .. }));
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&full_header(0), &mut buf).unwrap();
        buf[4..6].copy_from_slice(&0u16.to_le_bytes());
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion { found: 0 }));
    }

    #[test]
    fn decode_rejects_invalid_flags() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&full_header(0), &mut buf).unwrap();
        buf[6..8].copy_from_slice(&0b101u16.to_le_bytes());
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFlags { .. }));
    }

    #[test]
    fn decode_rejects_full_state_with_baseline() {
        let header = PacketHeader {
            version: VERSION,
            flags: PacketFlags::full_state(),
            registry_hash: 0,
            from_tick: 1,
            to_tick: 2,
            server_time_micros: 0,
            payload_len: 0,
        };
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&header, &mut buf).unwrap();
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTickRange { .. }));
    }

    #[test]
    fn decode_rejects_delta_without_baseline() {
        let header = PacketHeader {
            version: VERSION,
            flags: PacketFlags::delta_state(),
            registry_hash: 0,
            from_tick: 0,
            to_tick: 2,
            server_time_micros: 0,
            payload_len: 0,
        };
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&header, &mut buf).unwrap();
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTickRange { .. }));
    }

    #[test]
    fn decode_rejects_backwards_tick_range() {
        let header = PacketHeader {
            version: VERSION,
            flags: PacketFlags::delta_state(),
            registry_hash: 0,
            from_tick: 9,
            to_tick: 4,
            server_time_micros: 0,
            payload_len: 0,
        };
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&header, &mut buf).unwrap();
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTickRange { .. }));
    }

    #[test]
    fn decode_payload_length_mismatch() {
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&full_header(10), &mut buf).unwrap();
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn decode_payload_length_mismatch_with_extra_bytes() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        encode_header(&full_header(0), &mut buf).unwrap();
        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::PayloadLengthMismatch { .. }));
    }

    #[test]
    fn decode_sections_roundtrip() {
        let mut payload = [0u8; 16];
        let body = [1u8, 2, 3];
        let section_len = encode_section(SectionTag::ComponentUpdate, &body, &mut payload).unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + section_len];
        encode_header(&full_header(section_len as u32), &mut buf).unwrap();
        buf[HEADER_SIZE..HEADER_SIZE + section_len].copy_from_slice(&payload[..section_len]);

        let packet = decode_packet(&buf, &Limits::for_testing()).unwrap();
        assert_eq!(packet.sections.len(), 1);
        assert_eq!(packet.sections[0].tag, SectionTag::ComponentUpdate);
        assert_eq!(packet.sections[0].body, &body);
    }

    #[test]
    fn decode_rejects_unknown_section_tag() {
        let mut payload = [0u8; 8];
        let section_len = encode_section(SectionTag::EntityEnter, &[0u8; 2], &mut payload).unwrap();
        payload[0] = 99;

        let mut buf = vec![0u8; HEADER_SIZE + section_len];
        encode_header(&full_header(section_len as u32), &mut buf).unwrap();
        buf[HEADER_SIZE..HEADER_SIZE + section_len].copy_from_slice(&payload[..section_len]);

        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownSectionTag { tag: 99 }));
    }

    #[test]
    fn decode_rejects_truncated_section() {
        let mut payload = [0u8; 8];
        let section_len = encode_section(SectionTag::EntityLeave, &[0u8; 4], &mut payload).unwrap();

        // Claim the full section but deliver one byte less.
        let delivered = section_len - 1;
        let mut buf = vec![0u8; HEADER_SIZE + delivered];
        encode_header(&full_header(delivered as u32), &mut buf).unwrap();
        buf[HEADER_SIZE..].copy_from_slice(&payload[..delivered]);

        let err = decode_packet(&buf, &Limits::for_testing()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::SectionFraming(SectionFramingError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_enforces_section_limits() {
        let mut payload = [0u8; 8];
        let section_len = encode_section(SectionTag::EntityEnter, &[0u8; 5], &mut payload).unwrap();

        let mut buf = vec![0u8; HEADER_SIZE + section_len];
        encode_header(&full_header(section_len as u32), &mut buf).unwrap();
        buf[HEADER_SIZE..HEADER_SIZE + section_len].copy_from_slice(&payload[..section_len]);

        let limits = Limits {
            max_packet_bytes: 4096,
            max_sections: 1,
            max_section_len: 4,
        };
        let err = decode_packet(&buf, &limits).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitsExceeded {
                kind: LimitKind::SectionLength,
                ..
            }
        ));
    }

    #[test]
    fn decode_enforces_packet_byte_limit() {
        let buf = vec![0u8; 64];
        let limits = Limits {
            max_packet_bytes: 32,
            max_sections: 8,
            max_section_len: 16,
        };
        let err = decode_packet(&buf, &limits).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::LimitsExceeded {
                kind: LimitKind::PacketBytes,
                ..
            }
        ));
    }
}
