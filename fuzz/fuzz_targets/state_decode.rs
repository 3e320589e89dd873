#![no_main]

use codec::{decode_state, CodecLimits};
use libfuzzer_sys::fuzz_target;
use registry::{ComponentDef, ComponentTypeId, Registry};

fuzz_target!(|data: &[u8]| {
    let registry = Registry::builder()
        .component(
            ComponentDef::new(ComponentTypeId::new(1).unwrap(), "alpha").max_payload(64),
        )
        .component(
            ComponentDef::new(ComponentTypeId::new(2).unwrap(), "beta").max_payload(64),
        )
        .build()
        .unwrap();

    // Must never panic, whatever the bytes.
    let _ = decode_state(
        &registry,
        data,
        &wire::Limits::for_testing(),
        &CodecLimits::for_testing(),
    );
});
