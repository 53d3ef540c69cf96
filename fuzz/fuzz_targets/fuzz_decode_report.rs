#![no_main]
use libfuzzer_sys::fuzz_target;
use scale_core::{Availability, DeviceState, StabilityEngine, decode};
use std::time::Instant;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes from a misbehaving device must never panic the hot path.
    let engine = StabilityEngine::new(200);
    let mut state = DeviceState {
        availability: Availability::Online,
        ..DeviceState::new()
    };
    let mut out = Vec::new();
    let now = Instant::now();
    for chunk in data.chunks(6) {
        if let Ok(reading) = decode(chunk) {
            engine.apply(&mut state, reading, now, &mut out);
        }
    }
});
