// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock cache server for testing.
//!
//! This module provides `MockServer`, a configurable server that records every request it
//! handles and lets tests decide which requests hit.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{CacheServer, Keyed, LayerId, TraceRequest};

/// A request recorded by [`MockServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedRequest<K> {
    /// The key of the request.
    pub key: K,
    /// The layer that routed the request.
    pub layer: LayerId,
    /// Whether the server reported a hit.
    pub hit: bool,
}

type HitPredicate<K> = Box<dyn Fn(&K, LayerId) -> bool + Send + Sync>;

/// A configurable mock server for testing.
///
/// By default the server behaves like a cache of unlimited size: the first request for a key
/// misses and every later request for it hits. Use [`MockServer::hit_when`] to replace that
/// behavior with a predicate. All requests are recorded for later verification.
///
/// Clones share state, so a test can keep one handle while a layer holds another.
///
/// # Examples
///
/// ```
/// use cdn_server::testing::MockServer;
/// use cdn_server::{CacheServer, LayerId, TraceRequest};
///
/// let server = MockServer::<u64>::with_capacities(vec![100, 1000]);
///
/// assert!(!server.add_request(&TraceRequest::new(7), LayerId::EDGE));
/// assert!(server.add_request(&TraceRequest::new(7), LayerId::EDGE));
/// assert_eq!(server.request_count(), 2);
/// assert_eq!(server.hit_count(), 1);
/// ```
///
/// # Forcing Outcomes
///
/// ```
/// use cdn_server::testing::MockServer;
/// use cdn_server::{CacheServer, LayerId, TraceRequest};
///
/// let server = MockServer::<u64>::with_capacities(vec![100]);
///
/// // Only even keys hit
/// server.hit_when(|key, _layer| key % 2 == 0);
/// assert!(server.add_request(&TraceRequest::new(2), LayerId::EDGE));
/// assert!(!server.add_request(&TraceRequest::new(3), LayerId::EDGE));
/// ```
pub struct MockServer<K> {
    capacities: Arc<[u64]>,
    seen: Arc<Mutex<HashSet<K>>>,
    requests: Arc<Mutex<Vec<ServedRequest<K>>>>,
    hit_when: Arc<Mutex<Option<HitPredicate<K>>>>,
}

impl<K> std::fmt::Debug for MockServer<K>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("capacities", &self.capacities)
            .field("requests", &self.requests.lock().len())
            .field("hit_when", &self.hit_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<K> Clone for MockServer<K> {
    fn clone(&self) -> Self {
        Self {
            capacities: Arc::clone(&self.capacities),
            seen: Arc::clone(&self.seen),
            requests: Arc::clone(&self.requests),
            hit_when: Arc::clone(&self.hit_when),
        }
    }
}

impl<K> MockServer<K> {
    /// Creates a mock server with the given per-layer capacities.
    #[must_use]
    pub fn with_capacities(capacities: Vec<u64>) -> Self {
        Self {
            capacities: capacities.into(),
            seen: Arc::new(Mutex::new(HashSet::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            hit_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a mock server serving `layers` layers with the same capacity in each.
    #[must_use]
    pub fn uniform(capacity: u64, layers: usize) -> Self {
        Self::with_capacities(vec![capacity; layers])
    }

    /// Sets a predicate that decides whether a request hits, replacing the default
    /// "seen before" behavior.
    pub fn hit_when<F>(&self, predicate: F)
    where
        F: Fn(&K, LayerId) -> bool + Send + Sync + 'static,
    {
        *self.hit_when.lock() = Some(Box::new(predicate));
    }

    /// Restores the default "seen before" hit behavior.
    pub fn clear_hit_predicate(&self) {
        *self.hit_when.lock() = None;
    }

    /// Returns the number of requests handled so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of requests that hit.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.hit).count()
    }

    /// Clears all recorded requests. Remembered keys are kept.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

impl<K: Clone> MockServer<K> {
    /// Returns a clone of all recorded requests, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<ServedRequest<K>> {
        self.requests.lock().clone()
    }
}

impl<K> CacheServer for MockServer<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    type Request = TraceRequest<K>;

    fn add_request(&self, request: &TraceRequest<K>, layer: LayerId) -> bool {
        let key = request.key();
        let hit = match self.hit_when.lock().as_ref() {
            Some(predicate) => predicate(key, layer),
            None => !self.seen.lock().insert(key.clone()),
        };
        self.requests.lock().push(ServedRequest {
            key: key.clone(),
            layer,
            hit,
        });
        hit
    }

    fn layer_capacities(&self) -> &[u64] {
        &self.capacities
    }
}
