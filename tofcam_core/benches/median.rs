use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use tofcam_core::median::median5x5;
use tofcam_core::{RawImage, FRAME_PIXELS};

// Synthetic depth scene: smooth ramp plus white noise from a tiny PRNG.
fn synth_frame(noise_amp: u32, seed: u32) -> Box<RawImage> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let mut img = Box::new([0u8; FRAME_PIXELS]);
    for (i, p) in img.iter_mut().enumerate() {
        let base = ((i % 100) + (i / 100)) as u32; // 0..=198 ramp
        let noise = if noise_amp > 0 { next() % (2 * noise_amp) } else { 0 };
        *p = (base / 2 + noise).min(255) as u8;
    }
    img
}

pub fn bench_median(c: &mut Criterion) {
    let mut g = c.benchmark_group("median5x5");
    g.sample_size(50);

    for &noise in &[0u32, 8, 64] {
        let src = synth_frame(noise, 0xC0FFEE);
        g.bench_function(format!("noise_{noise}"), |b| {
            b.iter_batched(
                || Box::new([0u8; FRAME_PIXELS]),
                |mut dst| {
                    median5x5(black_box(&src), &mut dst);
                    black_box(dst);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(median, bench_median);
criterion_main!(median);
