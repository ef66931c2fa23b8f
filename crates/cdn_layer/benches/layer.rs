// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Benchmarks for cache layer routing and bookkeeping.

#![expect(missing_docs, reason = "Benchmark code does not require documentation")]

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cdn_layer::{CacheLayer, WeightSource};
use cdn_server::{CacheServer, LayerId, TraceRequest};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

criterion_group!(benches, bench_build, bench_add_request, bench_snapshot);
criterion_main!(benches);

const SERVER_COUNTS: [usize; 3] = [3, 16, 64];

/// Hits every fourth request without remembering anything, so the benchmark measures the layer.
struct Counting {
    capacities: [u64; 1],
    served: AtomicU64,
}

impl CacheServer for Counting {
    type Request = TraceRequest;

    fn add_request(&self, _request: &TraceRequest, _layer: LayerId) -> bool {
        self.served.fetch_add(1, Ordering::Relaxed) % 4 == 0
    }

    fn layer_capacities(&self) -> &[u64] {
        &self.capacities
    }
}

fn servers(count: usize) -> Vec<Arc<Counting>> {
    (0..count)
        .map(|i| {
            Arc::new(Counting {
                capacities: [100 + (i as u64 % 4) * 100],
                served: AtomicU64::new(0),
            })
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("CacheLayer::build");

    for count in SERVER_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                black_box(
                    CacheLayer::builder(LayerId::EDGE)
                        .weights(WeightSource::Uniform)
                        .build(servers(count)),
                )
            });
        });
    }

    group.finish();
}

fn bench_add_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("CacheLayer::add_request");
    group.throughput(Throughput::Elements(1));

    for count in SERVER_COUNTS {
        let mut layer = CacheLayer::builder(LayerId::EDGE)
            .weights(WeightSource::Uniform)
            .build(servers(count))
            .expect("valid layer");
        let mut rng = StdRng::seed_from_u64(7);

        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| {
                let request = TraceRequest::new(rng.random::<u64>());
                black_box(layer.add_request(0, &request))
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("CacheLayer::snapshot");

    for count in SERVER_COUNTS {
        let layer = CacheLayer::builder(LayerId::EDGE)
            .weights(WeightSource::Uniform)
            .build(servers(count))
            .expect("valid layer");

        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| black_box(layer.snapshot()));
        });
    }

    group.finish();
}
