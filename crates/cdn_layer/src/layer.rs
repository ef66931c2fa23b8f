// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache layer and its builder.

use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use cdn_server::{CacheServer, Keyed, LayerId};
use weighted_ring::{HashMode, HashRing};

use crate::{Error, LayerConfig, LayerHandle, LayerStatistics, Result, WeightSource, telemetry};

/// One tier of a CDN cache hierarchy.
///
/// A layer routes every request to one of its servers with a weighted consistent hash ring,
/// hands the request to that server, and counts the outcome. The server list, the weights and
/// the ring are fixed once the layer is built.
///
/// Servers are shared through [`Arc`]; the same server may sit in several layers. The next layer
/// is referenced by a [`LayerHandle`] into a registry the caller owns, typically a
/// [`CacheHierarchy`](crate::CacheHierarchy), so dropping a layer never drops its neighbor.
///
/// # Thread Safety
///
/// [`add_request`](Self::add_request) takes `&mut self`. Feeding one layer from several threads
/// means putting it behind a lock, which is exactly what `CacheHierarchy` does, and guarantees
/// that every [`snapshot`](Self::snapshot) sees whole requests only.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cdn_layer::{CacheLayer, WeightSource};
/// use cdn_server::testing::MockServer;
/// use cdn_server::{LayerId, TraceRequest};
///
/// let servers = (0..3).map(|_| Arc::new(MockServer::<u64>::uniform(1_000, 1))).collect();
/// let mut layer = CacheLayer::builder(LayerId::EDGE)
///     .weights(WeightSource::Uniform)
///     .build(servers)?;
///
/// let request = TraceRequest::new(42);
/// assert!(!layer.add_request(0, &request)?);
/// assert!(layer.add_request(0, &request)?);
///
/// let stats = layer.snapshot();
/// assert_eq!(stats.layer_request_count(), 2);
/// assert_eq!(stats.layer_hit_count(), 1);
/// assert_eq!(stats.requests_to_server()[layer.route(&request)], 2);
/// # Ok::<(), cdn_layer::Error>(())
/// ```
pub struct CacheLayer<S: CacheServer + ?Sized> {
    id: LayerId,
    servers: Box<[Arc<S>]>,
    ring: HashRing,
    stats: LayerStatistics,
    next: Option<LayerHandle>,
}

impl<S: CacheServer + ?Sized> Debug for CacheLayer<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("id", &self.id)
            .field("servers", &self.servers.len())
            .field("ring", &self.ring.len())
            .field("stats", &self.stats)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl<S: CacheServer + ?Sized> CacheLayer<S> {
    /// Builds a layer that weights servers by their capacity for `layer_id`.
    ///
    /// This is shorthand for `CacheLayer::builder(layer_id).hash_mode(hash_mode).build(servers)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `servers` is empty, if `hash_mode` cannot place keys on a ring, if a
    /// server has no capacity configured for `layer_id`, or if the capacities cannot be used as
    /// ring weights.
    pub fn new(servers: Vec<Arc<S>>, layer_id: LayerId, hash_mode: HashMode) -> Result<Self> {
        Self::builder(layer_id).hash_mode(hash_mode).build(servers)
    }

    /// Creates a builder for a layer with the given id.
    #[must_use]
    pub fn builder(layer_id: LayerId) -> CacheLayerBuilder<S> {
        CacheLayerBuilder::new(layer_id)
    }

    /// Returns the index of the server that owns `request`.
    ///
    /// Routing is a pure function of the request key and the layer's weights. It has no side
    /// effects; the server is not contacted and no statistics change.
    #[must_use]
    pub fn route(&self, request: &S::Request) -> usize {
        self.ring.locate(request.key())
    }

    /// Routes `request` to its server, lets the server handle it, and records the outcome.
    ///
    /// `source` is the index of the server in this layer the request is attributed to, for
    /// example the node that forwarded it. Returns whether the server reported a hit.
    ///
    /// All counters for one request are updated together: the layer's request count, the
    /// source's outgoing count, the target's incoming count, and on a hit the layer's and the
    /// target's hit counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerOutOfRange`] if `source` is not a server index of this layer. The
    /// request is then neither routed nor counted.
    pub fn add_request(&mut self, source: usize, request: &S::Request) -> Result<bool> {
        let server_count = self.servers.len();
        if source >= server_count {
            return Err(Error::ServerOutOfRange { index: source, server_count });
        }

        let target = self.route(request);
        let hit = self.servers[target].add_request(request, self.id);
        self.stats.record(source, target, hit);
        telemetry::request_served(self.id, source, target, hit);

        Ok(hit)
    }

    /// Returns an independent copy of the current statistics.
    ///
    /// Later requests do not change the returned value.
    #[must_use]
    pub fn snapshot(&self) -> LayerStatistics {
        self.stats.clone()
    }

    /// Returns the live statistics without copying them.
    #[must_use]
    pub const fn statistics(&self) -> &LayerStatistics {
        &self.stats
    }

    /// Sets the layer that requests continue to after this one.
    pub fn set_next_layer(&mut self, next: LayerHandle) {
        self.next = Some(next);
    }

    /// Returns the next layer, if one was set.
    #[must_use]
    pub const fn next_layer(&self) -> Option<LayerHandle> {
        self.next
    }

    /// Makes this layer the last one in its chain.
    pub fn clear_next_layer(&mut self) {
        self.next = None;
    }

    /// Recomputes weights and the ring after server changes.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`]; membership and weights are fixed for the lifetime
    /// of a layer. The layer is left unchanged and remains usable.
    pub fn rebalance(&mut self) -> Result<()> {
        telemetry::unsupported(self.id, "rebalance");
        Err(Error::Unsupported { operation: "rebalance" })
    }

    /// Adds a server to the layer.
    ///
    /// # Errors
    ///
    /// Always returns [`Error::Unsupported`]; the server is not kept and the layer is left
    /// unchanged.
    pub fn add_server(&mut self, _server: Arc<S>) -> Result<()> {
        telemetry::unsupported(self.id, "add_server");
        Err(Error::Unsupported { operation: "add_server" })
    }

    /// Returns the id of this layer.
    #[must_use]
    pub const fn layer_id(&self) -> LayerId {
        self.id
    }

    /// Returns the number of servers in this layer.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Returns the server at `index`, or `None` if out of range.
    #[must_use]
    pub fn server(&self, index: usize) -> Option<&Arc<S>> {
        self.servers.get(index)
    }

    /// Returns all servers in index order.
    #[must_use]
    pub fn servers(&self) -> &[Arc<S>] {
        &self.servers
    }

    /// Returns the routing weight of each server.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        self.ring.weights()
    }

    /// Returns the hash ring used for routing.
    #[must_use]
    pub const fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Returns the hash mode used for routing.
    #[must_use]
    pub const fn hash_mode(&self) -> HashMode {
        self.ring.hash_mode()
    }
}

/// Builder for [`CacheLayer`].
///
/// # Defaults
///
/// | Setting | Default |
/// | :--- | :--- |
/// | `hash_mode` | [`HashMode::Xxh3`] |
/// | `weights` | [`WeightSource::LayerCapacity`] |
/// | `points_per_server` | [`weighted_ring::DEFAULT_POINTS_PER_SERVER`] |
/// | `reference_weight` | [`weighted_ring::DEFAULT_REFERENCE_WEIGHT`] |
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cdn_layer::{CacheLayer, WeightSource};
/// use cdn_server::testing::MockServer;
/// use cdn_server::LayerId;
///
/// let servers = (0..4).map(|_| Arc::new(MockServer::<u64>::uniform(1_000, 2))).collect();
/// let layer = CacheLayer::builder(LayerId::new(2).unwrap())
///     .weights(WeightSource::Explicit(vec![1.0, 1.0, 1.0, 3.0]))
///     .points_per_server(100)
///     .build(servers)?;
///
/// assert_eq!(layer.server_count(), 4);
/// assert_eq!(layer.weights(), &[1.0, 1.0, 1.0, 3.0]);
/// # Ok::<(), cdn_layer::Error>(())
/// ```
pub struct CacheLayerBuilder<S: ?Sized> {
    layer_id: LayerId,
    config: LayerConfig,
    _server: PhantomData<fn(Arc<S>)>,
}

impl<S: ?Sized> Debug for CacheLayerBuilder<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayerBuilder")
            .field("layer_id", &self.layer_id)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: CacheServer + ?Sized> CacheLayerBuilder<S> {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(layer_id: LayerId) -> Self {
        Self {
            layer_id,
            config: LayerConfig::default(),
            _server: PhantomData,
        }
    }

    /// Replaces all settings with `config`.
    #[must_use]
    pub fn config(mut self, config: LayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the hash mode used for routing.
    #[must_use]
    pub fn hash_mode(mut self, mode: HashMode) -> Self {
        self.config.hash_mode = mode;
        self
    }

    /// Sets where per-server weights come from.
    #[must_use]
    pub fn weights(mut self, weights: WeightSource) -> Self {
        self.config.weights = weights;
        self
    }

    /// Sets the number of ring points given to a server whose weight equals the reference
    /// weight.
    ///
    /// More points spread keys more evenly at the cost of memory and build time.
    #[must_use]
    pub fn points_per_server(mut self, points: usize) -> Self {
        self.config.points_per_server = points;
        self
    }

    /// Sets the weight that receives exactly `points_per_server` points.
    ///
    /// Capacity-derived weights are in the servers' own units, so large capacities need a
    /// matching reference weight to stay under [`weighted_ring::MAX_TOTAL_POINTS`].
    #[must_use]
    pub fn reference_weight(mut self, weight: f64) -> Self {
        self.config.reference_weight = weight;
        self
    }

    /// Builds the layer over `servers`.
    ///
    /// The weights, the ring and the statistics are all derived here; on error, nothing is
    /// built.
    ///
    /// # Errors
    ///
    /// Returns an error if `servers` is empty, if the hash mode is not supported, if the
    /// weights cannot be derived, or if the ring rejects them.
    pub fn build(self, servers: Vec<Arc<S>>) -> Result<CacheLayer<S>> {
        let Self { layer_id, config, .. } = self;

        if servers.is_empty() {
            return Err(Error::NoServers);
        }
        if !config.hash_mode.is_supported() {
            let operation = config.hash_mode.as_str();
            telemetry::unsupported(layer_id, operation);
            return Err(Error::Unsupported { operation });
        }

        let weights = config.weights.derive(&servers, layer_id)?;
        let ring = HashRing::builder()
            .hash_mode(config.hash_mode)
            .points_per_server(config.points_per_server)
            .reference_weight(config.reference_weight)
            .build(&weights)?;

        let mut stats = LayerStatistics::new(servers.len(), layer_id);
        stats.set_weights(&weights);

        telemetry::layer_built(layer_id, servers.len(), config.hash_mode, ring.len());

        Ok(CacheLayer {
            id: layer_id,
            servers: servers.into_boxed_slice(),
            ring,
            stats,
            next: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use cdn_server::TraceRequest;
    use cdn_server::testing::MockServer;
    use static_assertions::assert_impl_all;

    use super::*;

    type Server = MockServer<u64>;

    fn servers(count: usize) -> Vec<Arc<Server>> {
        (0..count).map(|_| Arc::new(Server::uniform(1, 2))).collect()
    }

    #[test]
    fn thread_safe_type() {
        assert_impl_all!(CacheLayer<Server>: Send, Sync);
        assert_impl_all!(CacheLayer<dyn CacheServer<Request = TraceRequest>>: Send, Sync);
    }

    #[test]
    fn new_weights_by_capacity() {
        let servers = vec![
            Arc::new(Server::with_capacities(vec![1, 10])),
            Arc::new(Server::with_capacities(vec![3, 10])),
        ];
        let layer = CacheLayer::new(servers, LayerId::EDGE, HashMode::Xxh3).expect("valid layer");

        assert_eq!(layer.weights(), &[1.0, 3.0]);
        assert_eq!(layer.statistics().weights(), &[1.0, 3.0]);
        assert_eq!(layer.hash_mode(), HashMode::Xxh3);
        assert_eq!(layer.layer_id(), LayerId::EDGE);
    }

    #[test]
    fn empty_layer_is_rejected() {
        let error = CacheLayer::<Server>::new(Vec::new(), LayerId::EDGE, HashMode::Xxh3).expect_err("no servers");
        assert_eq!(error, Error::NoServers);
    }

    #[test]
    fn unsupported_hash_mode_is_rejected() {
        let error = CacheLayer::new(servers(3), LayerId::EDGE, HashMode::Modulo).expect_err("modulo");
        assert!(error.is_unsupported());
    }

    #[test]
    fn zero_capacities_are_a_ring_error() {
        let servers = vec![Arc::new(Server::uniform(0, 1)), Arc::new(Server::uniform(0, 1))];
        let error = CacheLayer::new(servers, LayerId::EDGE, HashMode::Xxh3).expect_err("zero weights");
        assert_eq!(error, Error::Ring(weighted_ring::Error::ZeroTotalWeight));
    }

    #[test]
    fn route_has_no_side_effects() {
        let servers = servers(3);
        let layer = CacheLayer::new(servers.clone(), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");

        let request = TraceRequest::new(7);
        let first = layer.route(&request);
        assert_eq!(layer.route(&request), first);
        assert_eq!(layer.statistics().layer_request_count(), 0);
        assert!(servers.iter().all(|s| s.request_count() == 0));
    }

    #[test]
    fn add_request_reaches_routed_server() {
        let servers = servers(3);
        let mut layer = CacheLayer::new(servers.clone(), LayerId::new(2).expect("non-zero"), HashMode::Xxh3).expect("valid layer");

        let request = TraceRequest::new(99);
        let target = layer.route(&request);
        assert_eq!(layer.add_request(1, &request), Ok(false));

        let served = servers[target].requests();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].key, 99);
        assert_eq!(served[0].layer.get(), 2);
    }

    #[test]
    fn out_of_range_source_changes_nothing() {
        let servers = servers(2);
        let mut layer = CacheLayer::new(servers.clone(), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");

        assert_eq!(
            layer.add_request(2, &TraceRequest::new(1)),
            Err(Error::ServerOutOfRange { index: 2, server_count: 2 })
        );
        let mut untouched = LayerStatistics::new(2, LayerId::EDGE);
        untouched.set_weights(&[1.0, 1.0]);
        assert_eq!(layer.snapshot(), untouched);
        assert!(servers.iter().all(|s| s.request_count() == 0));
    }

    #[test]
    fn unsupported_operations_leave_layer_intact() {
        let mut layer = CacheLayer::new(servers(2), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");
        let ring = layer.ring().clone();

        assert!(layer.rebalance().expect_err("rebalance").is_unsupported());
        assert!(layer.add_server(Arc::new(Server::uniform(100, 1))).expect_err("add_server").is_unsupported());

        assert_eq!(layer.server_count(), 2);
        assert_eq!(layer.ring(), &ring);
        assert_eq!(layer.add_request(0, &TraceRequest::new(5)), Ok(false));
    }

    #[test]
    fn next_layer_is_a_handle() {
        let mut layer = CacheLayer::new(servers(1), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");
        assert_eq!(layer.next_layer(), None);

        layer.set_next_layer(LayerHandle::new(4));
        assert_eq!(layer.next_layer(), Some(LayerHandle::new(4)));

        layer.clear_next_layer();
        assert_eq!(layer.next_layer(), None);
    }

    #[test]
    fn server_accessors() {
        let servers = servers(3);
        let layer = CacheLayer::new(servers.clone(), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");

        assert_eq!(layer.server_count(), 3);
        assert!(layer.server(3).is_none());
        assert!(Arc::ptr_eq(layer.server(1).expect("in range"), &servers[1]));
        assert_eq!(layer.servers().len(), 3);
    }

    #[test]
    fn builder_applies_config() {
        let config = LayerConfig {
            weights: WeightSource::Uniform,
            points_per_server: 10,
            ..LayerConfig::default()
        };
        let layer = CacheLayer::builder(LayerId::EDGE).config(config).build(servers(4)).expect("valid layer");

        assert_eq!(layer.weights(), &[1.0; 4]);
        assert_eq!(layer.ring().points_for(0), Some(10));
    }

    #[test]
    fn builder_rejects_zero_points() {
        let error = CacheLayer::builder(LayerId::EDGE)
            .points_per_server(0)
            .build(servers(2))
            .expect_err("no points");
        assert_eq!(error, Error::Ring(weighted_ring::Error::NoPoints));
    }

    #[test]
    fn large_capacities_need_a_reference_weight() {
        const GIB: u64 = 1 << 30;
        let servers = || vec![Arc::new(Server::uniform(GIB, 1)), Arc::new(Server::uniform(2 * GIB, 1))];

        let error = CacheLayer::new(servers(), LayerId::EDGE, HashMode::Xxh3).expect_err("oversized ring");
        assert_eq!(
            error,
            Error::Ring(weighted_ring::Error::TooManyPoints {
                limit: weighted_ring::MAX_TOTAL_POINTS
            })
        );

        #[expect(clippy::cast_precision_loss, reason = "GIB is exactly representable")]
        let reference = GIB as f64;
        let layer = CacheLayer::builder(LayerId::EDGE)
            .reference_weight(reference)
            .build(servers())
            .expect("valid layer");
        assert_eq!(layer.ring().points_for(0), Some(weighted_ring::DEFAULT_POINTS_PER_SERVER));
        assert_eq!(layer.ring().points_for(1), Some(2 * weighted_ring::DEFAULT_POINTS_PER_SERVER));
        assert_eq!(layer.weights(), &[reference, 2.0 * reference]);
    }

    #[test]
    fn add_server_does_not_keep_the_server() {
        let mut layer = CacheLayer::new(servers(1), LayerId::EDGE, HashMode::Xxh3).expect("valid layer");
        let extra = Arc::new(Server::uniform(1, 1));

        layer.add_server(Arc::clone(&extra)).expect_err("unsupported");
        assert_eq!(Arc::strong_count(&extra), 1);
    }
}
