use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{distributions::Uniform, thread_rng, Rng};
use std::hint::black_box;
use trainkit::histogram::{Histogram, DEFAULT_BINS};
use trainkit::prepare::{prepare, RawRecord};

fn gen_records(len: usize, h: usize, w: usize) -> Vec<RawRecord> {
    let mut rng = thread_rng();
    let pixels = Uniform::new_inclusive(0u8, 255);
    (0..len)
        .map(|i| {
            let data: Vec<u8> = (0..h * w).map(|_| rng.sample(pixels)).collect();
            RawRecord::from_pixels(data, (h, w, 1), (i % 10) as i64).unwrap()
        })
        .collect()
}

fn prepare_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Prepare");

    // (records, batch_size, height, width)
    let params = vec![
        (1_000, 32, 28, 28),  // MNIST-sized images
        (1_000, 128, 28, 28), // Larger batch
        (200, 32, 64, 64),    // Larger resolution
    ];

    for (len, batch_size, height, width) in params {
        let records = gen_records(len, height, width);
        group.throughput(Throughput::Elements((len * height * width) as u64));
        group.bench_with_input(
            BenchmarkId::new("prepare", format!("{len}x{height}x{width}_b{batch_size}")),
            &records,
            |b, records| {
                b.iter(|| prepare(black_box(records), &[], batch_size, height * width, 10).unwrap())
            },
        );
    }
    group.finish();
}

fn histogram_benchmark(c: &mut Criterion) {
    let mut rng = thread_rng();
    let values: Vec<f64> = (0..100_000).map(|_| rng.gen_range(-1.0..1.0)).collect();
    c.bench_function("histogram_100k", |b| {
        b.iter(|| Histogram::from_values(black_box(&values), DEFAULT_BINS))
    });
}

criterion_group!(benches, prepare_benchmark, histogram_benchmark);
criterion_main!(benches);
