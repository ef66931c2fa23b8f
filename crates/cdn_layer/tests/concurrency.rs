// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layers fed from several worker threads.

use std::sync::Arc;
use std::thread;

use cdn_layer::{CacheHierarchy, CacheLayer, WeightSource};
use cdn_server::testing::MockServer;
use cdn_server::{LayerId, TraceRequest};
use parking_lot::Mutex;
use weighted_ring::HashMode;

const WORKERS: u64 = 4;
const REQUESTS_PER_WORKER: u64 = 2_500;

type Server = MockServer<u64>;

fn servers(count: usize, layers: usize) -> Vec<Arc<Server>> {
    (0..count).map(|_| Arc::new(Server::uniform(1, layers))).collect()
}

#[test]
fn locked_layer_loses_no_updates() {
    let layer = Arc::new(Mutex::new(
        CacheLayer::new(servers(3, 1), LayerId::EDGE, HashMode::Xxh3).expect("valid layer"),
    ));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let layer = Arc::clone(&layer);
            thread::spawn(move || {
                let source = usize::try_from(worker % 3).expect("small");
                for i in 0..REQUESTS_PER_WORKER {
                    let request = TraceRequest::new(worker * REQUESTS_PER_WORKER + i);
                    layer.lock().add_request(source, &request).expect("valid source");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let stats = layer.lock().snapshot();
    assert_eq!(stats.layer_request_count(), WORKERS * REQUESTS_PER_WORKER);
    assert_eq!(stats.requests_to_server().iter().sum::<u64>(), WORKERS * REQUESTS_PER_WORKER);
    assert_eq!(stats.requests_from_server(), &[2 * REQUESTS_PER_WORKER, REQUESTS_PER_WORKER, REQUESTS_PER_WORKER]);
    // Every key is unique, so the default mock never hits.
    assert_eq!(stats.layer_hit_count(), 0);
}

#[test]
fn snapshots_taken_while_feeding_are_consistent() {
    let layer = Arc::new(Mutex::new(
        CacheLayer::new(servers(2, 1), LayerId::EDGE, HashMode::Xxh3).expect("valid layer"),
    ));

    let feeder = {
        let layer = Arc::clone(&layer);
        thread::spawn(move || {
            for key in 0..5_000_u64 {
                // Every key is requested twice in a row, the second time as a hit.
                let request = TraceRequest::new(key);
                let mut guard = layer.lock();
                guard.add_request(0, &request).expect("valid source");
                guard.add_request(1, &request).expect("valid source");
            }
        })
    };

    for _ in 0..200 {
        let stats = layer.lock().snapshot();
        assert_eq!(stats.requests_to_server().iter().sum::<u64>(), stats.layer_request_count());
        assert_eq!(stats.hits_per_server().iter().sum::<u64>(), stats.layer_hit_count());
        assert_eq!(stats.requests_from_server()[0], stats.requests_from_server()[1]);
        assert_eq!(stats.layer_hit_count() * 2, stats.layer_request_count());
    }

    feeder.join().expect("feeder panicked");
    assert_eq!(layer.lock().statistics().layer_request_count(), 10_000);
}

#[test]
fn hierarchy_layers_fed_in_parallel() {
    // The same servers back both layers, as in a CDN where one node serves several tiers.
    let shared = servers(3, 2);
    let mut hierarchy = CacheHierarchy::new();
    let edge = hierarchy.push(
        CacheLayer::builder(LayerId::EDGE)
            .weights(WeightSource::Uniform)
            .build(shared.clone())
            .expect("valid layer"),
    );
    let mid = hierarchy.push(
        CacheLayer::builder(LayerId::new(2).expect("non-zero"))
            .weights(WeightSource::Uniform)
            .build(shared.clone())
            .expect("valid layer"),
    );
    hierarchy.link(edge, mid).expect("linked");
    let hierarchy = Arc::new(hierarchy);

    let workers: Vec<_> = [edge, mid]
        .into_iter()
        .flat_map(|handle| (0..2_u64).map(move |worker| (handle, worker)))
        .map(|(handle, worker)| {
            let hierarchy = Arc::clone(&hierarchy);
            thread::spawn(move || {
                let layer = hierarchy.get(handle).expect("registered");
                for i in 0..1_000 {
                    let request = TraceRequest::new(worker * 1_000 + i);
                    layer.lock().add_request(0, &request).expect("valid source");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let snapshots = hierarchy.snapshots();
    assert_eq!(snapshots[0].layer_request_count(), 2_000);
    assert_eq!(snapshots[1].layer_request_count(), 2_000);
    let served: usize = shared.iter().map(|s| s.request_count()).sum();
    assert_eq!(served, 4_000);
    assert_eq!(hierarchy.chain(edge), vec![edge, mid]);
}
