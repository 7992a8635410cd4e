use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nhnsw::{Distance, HnswIndex, HnswParams, SharedIndex, VectorStore};

fn generate_vector(dim: usize, seed: usize) -> Vec<f32> {
    (0..dim)
        .map(|j| ((seed * dim + j) % 100) as f32 / 100.0)
        .collect()
}

fn vector_store(count: usize, dim: usize) -> VectorStore {
    let mut store = VectorStore::new(dim, Distance::Euclidean);
    for i in 0..count {
        store.insert(i as u32, generate_vector(dim, i)).unwrap();
    }
    store
}

fn params() -> HnswParams {
    HnswParams::with_m(16)
        .with_m0(32)
        .with_layers(5)
        .with_ef_construction(100)
        .with_level_factor(1.0 / 16f64.ln())
        .with_seed(42)
}

fn bench_insert_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_single");
    group.sample_size(100);

    group.bench_function("single_128d", |b| {
        let store = vector_store(100_000, 128);
        let mut index = HnswIndex::new(params(), store).unwrap();

        let mut i = 1u32;
        b.iter(|| {
            // Wrap around: later iterations exercise the re-insertion path
            black_box(index.insert(i).unwrap());
            i = i % 99_999 + 1;
        });
    });

    group.finish();
}

fn bench_insert_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_batch");
    group.sample_size(20);

    for batch_size in [100usize, 1000].iter() {
        let store = vector_store(*batch_size + 1, 128);
        group.bench_with_input(
            BenchmarkId::new("batch_128d", batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter_batched(
                    || HnswIndex::new(params(), store.clone()).unwrap(),
                    |mut index| {
                        index.insert_batch(1..=batch_size as u32).unwrap();
                        black_box(index)
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_shared_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_insert");
    group.sample_size(20);

    // Each publish clones the layer graphs; compare per-insert and per-batch publishing
    let store = vector_store(501, 64);
    group.bench_function("publish_each", |b| {
        b.iter_batched(
            || SharedIndex::new(HnswIndex::new(params(), store.clone()).unwrap()),
            |shared| {
                for id in 1..=500u32 {
                    shared.insert(id).unwrap();
                }
                black_box(shared)
            },
            BatchSize::LargeInput,
        );
    });
    group.bench_function("publish_batch", |b| {
        b.iter_batched(
            || SharedIndex::new(HnswIndex::new(params(), store.clone()).unwrap()),
            |shared| {
                shared.insert_batch(1..=500u32).unwrap();
                black_box(shared)
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_insert_single, bench_insert_batch, bench_shared_insert);
criterion_main!(benches);
