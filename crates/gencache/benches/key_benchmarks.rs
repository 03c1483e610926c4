//! Performance benchmarks for key synthesis and the generation store
//!
//! Measures key lookup on the hot path, refresh fan-out, and raw store
//! throughput through the traced wrapper.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gencache::keys::KeySynthesizer;
use gencache::store::{CacheStore, InMemoryStore, TracedStore};
use tokio::runtime::Runtime;

fn dependencies(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("p/bench/d/dom_{i}")).collect()
}

fn bench_get_key(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("get_key");

    for deps in [1usize, 4, 16] {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryStore::new());
        let synthesizer = KeySynthesizer::new(store);
        let names = dependencies(deps);

        rt.block_on(async {
            synthesizer.get_key("bench", &names).await.unwrap();
        });

        group.bench_with_input(BenchmarkId::new("unchanged", deps), &names, |b, names| {
            b.to_async(&rt).iter(|| async {
                let _ = black_box(synthesizer.get_key("bench", names).await);
            });
        });
    }

    group.finish();
}

fn bench_refresh(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("refresh");

    for deps in [1usize, 8, 64] {
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryStore::new());
        let synthesizer = KeySynthesizer::new(store);
        let names = dependencies(deps);

        group.throughput(Throughput::Elements(deps as u64));
        group.bench_with_input(BenchmarkId::from_parameter(deps), &names, |b, names| {
            b.to_async(&rt).iter(|| async {
                black_box(synthesizer.refresh(names).await);
            });
        });
    }

    group.finish();
}

fn bench_store_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("store_throughput");

    let direct = InMemoryStore::new();
    let traced = TracedStore::new(InMemoryStore::new(), "bench");

    for size in [100usize, 10_000] {
        let value = vec![0u8; size];
        rt.block_on(async {
            direct.put("bench", &value).await.unwrap();
            traced.put("bench", &value).await.unwrap();
        });

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("direct_put", size), &value, |b, value| {
            b.to_async(&rt).iter(|| async {
                let _ = black_box(direct.put("bench", value).await);
            });
        });
        group.bench_with_input(BenchmarkId::new("traced_put", size), &value, |b, value| {
            b.to_async(&rt).iter(|| async {
                let _ = black_box(traced.put("bench", value).await);
            });
        });
        group.bench_function(BenchmarkId::new("direct_get", size), |b| {
            b.to_async(&rt).iter(|| async {
                let _ = black_box(direct.get("bench").await);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_key, bench_refresh, bench_store_throughput);
criterion_main!(benches);
