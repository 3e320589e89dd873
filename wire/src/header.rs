//! Packet header types and constants.

/// Magic number identifying tickrep packets.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: u32 = 0x5452_4550; // "TREP" in ASCII

/// Current wire format version.
pub const VERSION: u16 = 1;

/// Header size in bytes (44 total).
pub const HEADER_SIZE: usize = 4 + 2 + 2 + 8 + 8 + 8 + 8 + 4;

/// Packet flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketFlags(u16);

impl PacketFlags {
    /// Flag indicating a full state packet (no baseline required).
    pub const FULL_STATE: u16 = 1 << 0;

    /// Flag indicating a delta state packet.
    pub const DELTA_STATE: u16 = 1 << 1;

    /// Reserved bits mask (must be zero in version 1).
    const RESERVED_MASK: u16 = !0b11;

    /// Creates new flags from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw flag bits.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Returns `true` if this is a full state.
    #[must_use]
    pub const fn is_full_state(self) -> bool {
        self.0 & Self::FULL_STATE != 0
    }

    /// Returns `true` if this is a delta state.
    #[must_use]
    pub const fn is_delta_state(self) -> bool {
        self.0 & Self::DELTA_STATE != 0
    }

    /// Returns `true` if the flags are valid for version 1.
    ///
    /// Valid means exactly one of `FULL_STATE` or `DELTA_STATE` is set,
    /// and no reserved bits are set.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        let has_full = self.is_full_state();
        let has_delta = self.is_delta_state();
        let has_reserved = self.0 & Self::RESERVED_MASK != 0;

        has_full ^ has_delta && !has_reserved
    }

    /// Creates flags for a full state.
    #[must_use]
    pub const fn full_state() -> Self {
        Self(Self::FULL_STATE)
    }

    /// Creates flags for a delta state.
    #[must_use]
    pub const fn delta_state() -> Self {
        Self(Self::DELTA_STATE)
    }
}

/// Packet header (version 1).
///
/// This struct represents the header fields *after* the magic number.
/// The magic number is validated separately during decoding and is not
/// stored in this struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Wire format version.
    pub version: u16,
    /// Packet flags.
    pub flags: PacketFlags,
    /// Component registry hash for compatibility checking.
    pub registry_hash: u64,
    /// Tick the receiver's state must be at before applying (0 for full states).
    pub from_tick: u64,
    /// Tick this state advances the receiver to.
    pub to_tick: u64,
    /// Server timebase in microseconds at production time.
    pub server_time_micros: u64,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl PacketHeader {
    /// Creates a new header for a full state.
    #[must_use]
    pub const fn full_state(
        registry_hash: u64,
        to_tick: u64,
        server_time_micros: u64,
        payload_len: u32,
    ) -> Self {
        Self {
            version: VERSION,
            flags: PacketFlags::full_state(),
            registry_hash,
            from_tick: 0,
            to_tick,
            server_time_micros,
            payload_len,
        }
    }

    /// Creates a new header for a delta state.
    #[must_use]
    pub const fn delta_state(
        registry_hash: u64,
        from_tick: u64,
        to_tick: u64,
        server_time_micros: u64,
        payload_len: u32,
    ) -> Self {
        Self {
            version: VERSION,
            flags: PacketFlags::delta_state(),
            registry_hash,
            from_tick,
            to_tick,
            server_time_micros,
            payload_len,
        }
    }
}
