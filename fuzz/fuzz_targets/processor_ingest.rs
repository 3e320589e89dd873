#![no_main]

use client::{ProcessorConfig, StateProcessor};
use codec::{GameState, Tick};
use libfuzzer_sys::fuzz_target;

// Interpret the input as a little script of inserts and process calls; no
// combination may panic or wedge the processor.
fuzz_target!(|data: &[u8]| {
    let mut processor = StateProcessor::new(ProcessorConfig::for_testing());

    for chunk in data.chunks(3) {
        match chunk {
            [op, from, to] => {
                if op % 2 == 0 {
                    let state =
                        GameState::delta(Tick::new(u64::from(*from)), Tick::new(u64::from(*to)), 0);
                    let _ = processor.insert(state);
                } else {
                    let _ = processor.process_tick(Tick::new(u64::from(*to)));
                }
            }
            [_, tick] => {
                let _ = processor.process_tick(Tick::new(u64::from(*tick)));
            }
            _ => {}
        }
    }
});
