use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use scale_core::decoder::{UNIT_GRAMS, frame};
use scale_core::status::code;
use scale_core::{Availability, DeviceState, StabilityEngine, decode};
use std::time::Instant;

// Synthetic trace: slow ramp with a few grams of xorshift noise
fn synth_reports(n: usize, seed: u32) -> Vec<[u8; 6]> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    (0..n)
        .map(|i| {
            let noise = (next() % 5) as u16;
            let status = if i % 50 < 10 { code::IN_MOTION } else { code::STABLE };
            frame(status, UNIT_GRAMS, 0, (i / 10) as u16 + noise)
        })
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let reports = synth_reports(1024, 7);
    c.bench_function("decode_1024_reports", |b| {
        b.iter(|| {
            for r in &reports {
                let _ = black_box(decode(black_box(r)));
            }
        })
    });
}

fn bench_engine(c: &mut Criterion) {
    let readings: Vec<_> = synth_reports(4096, 42)
        .iter()
        .filter_map(|r| decode(r).ok())
        .collect();
    let engine = StabilityEngine::new(200);
    c.bench_function("engine_apply_4096", |b| {
        b.iter_batched(
            || DeviceState {
                availability: Availability::Online,
                ..DeviceState::new()
            },
            |mut state| {
                let mut out = Vec::with_capacity(64);
                let now = Instant::now();
                for r in &readings {
                    engine.apply(&mut state, *r, now, &mut out);
                }
                black_box(out.len())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_decode, bench_engine);
criterion_main!(benches);
