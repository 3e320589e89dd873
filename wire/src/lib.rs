//! Wire framing and packet layout for tickrep state replication.
//!
//! This crate defines the outermost packet structure: a fixed header carrying
//! the tick range and registry hash, followed by tagged, length-prefixed
//! sections. Section *bodies* are opaque at this layer; the codec crate gives
//! them meaning.
//!
//! # Design Principles
//!
//! - **Bounded decoding** - All limits are explicit and enforced.
//! - **No panics on malformed input** - Every failure is a structured error.
//! - **Transport-agnostic** - Delivery may be unreliable and unordered; the
//!   header's tick range is what re-establishes ordering, not the transport.

mod bytes;
mod error;
mod header;
mod limits;
mod packet;

pub use bytes::{ByteError, ByteReader, ByteResult, ByteWriter};
pub use error::{DecodeError, EncodeError, LimitKind, SectionFramingError, WireResult};
pub use header::{PacketFlags, PacketHeader, HEADER_SIZE, MAGIC, VERSION};
pub use limits::Limits;
pub use packet::{
    decode_packet, decode_sections, encode_header, encode_section, SectionTag, WirePacket,
    WireSection,
};
