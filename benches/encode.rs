// Run with:  cargo bench --bench encode

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use stable_ws2811::encode::{encode, TransferBuffer, BYTES_PER_PIXEL, WORDS_PER_PIXEL};
use std::hint::black_box;
use std::time::Duration;

const PIXELS: usize = 300;

// Number of iterations to target ~1-5ms per measurement
const ITERATIONS: usize = 100;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10)) // Longer measurement time
        .warm_up_time(Duration::from_secs(3))
        .confidence_level(0.95)
        .significance_level(0.05)
}

fn encode_strip(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements((PIXELS * ITERATIONS) as u64));

    let pixels: Vec<u8> = (0..PIXELS * BYTES_PER_PIXEL).map(|i| i as u8).collect();

    group.bench_function("encode_slice", |b| {
        let mut words = vec![0u32; PIXELS * WORDS_PER_PIXEL];

        b.iter(|| {
            for _ in 0..ITERATIONS {
                encode(black_box(&pixels), black_box(&mut words));
            }
        });
    });

    group.bench_function("transfer_buffer", |b| {
        let mut storage = vec![0u32; PIXELS * WORDS_PER_PIXEL];
        let mut buffer = TransferBuffer::new(&mut storage);

        b.iter(|| {
            for _ in 0..ITERATIONS {
                black_box(&mut buffer).encode(black_box(&pixels));
            }
        });
    });

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = encode_strip);
criterion_main!(benches);
