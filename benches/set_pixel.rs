// Run with:  cargo bench --bench set_pixel

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use stable_ws2811::encode::BYTES_PER_PIXEL;
use stable_ws2811::pixels::PixelStore;
use stable_ws2811::ChannelOrder;
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

fn set_pixel(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_pixel");
    group.throughput(Throughput::Elements((PIXELS * ITERATIONS) as u64));

    for order in ChannelOrder::ALL {
        group.bench_function(format!("{order:?}"), |b| {
            let mut bytes = vec![0u8; PIXELS * BYTES_PER_PIXEL];
            let mut store = PixelStore::new(&mut bytes, order);

            b.iter(|| {
                for _ in 0..ITERATIONS {
                    for i in 0..PIXELS {
                        black_box(&mut store)
                            .set(black_box(i), black_box(stable_ws2811::color(0x10, 0x20, 0x30)));
                    }
                }
            });
        });
    }

    group.finish();
}

criterion_group!(name = benches; config = configure_criterion(); targets = set_pixel);
criterion_main!(benches);
