use proptest::prelude::*;
use wire::{decode_packet, encode_header, Limits, PacketHeader, HEADER_SIZE};

proptest! {
    // Arbitrary bytes must never panic the decoder; they either decode or
    // produce a structured error.
    #[test]
    fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_packet(&bytes, &Limits::for_testing());
    }

    #[test]
    fn header_roundtrip(
        registry_hash in any::<u64>(),
        to_tick in 1u64..u64::MAX,
        server_time in any::<u64>(),
    ) {
        let header = PacketHeader::full_state(registry_hash, to_tick, server_time, 0);
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&header, &mut buf).unwrap();

        let packet = decode_packet(&buf, &Limits::for_testing()).unwrap();
        prop_assert_eq!(packet.header, header);
    }

    #[test]
    fn delta_header_roundtrip(
        from_tick in 1u64..1_000_000,
        advance in 1u64..1_000_000,
    ) {
        let header = PacketHeader::delta_state(7, from_tick, from_tick + advance, 0, 0);
        let mut buf = [0u8; HEADER_SIZE];
        encode_header(&header, &mut buf).unwrap();

        let packet = decode_packet(&buf, &Limits::for_testing()).unwrap();
        prop_assert_eq!(packet.header.from_tick, from_tick);
        prop_assert_eq!(packet.header.to_tick, from_tick + advance);
    }
}
