// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-layer request and hit counters.

use cdn_server::LayerId;

/// Request and hit counters for one cache layer.
///
/// Every per-server slice has exactly one entry per server in the layer, indexed by the
/// server's position in the layer. Counters only ever grow.
///
/// `LayerStatistics` is a plain value: [`Clone`] makes a fully independent deep copy, which is
/// what [`CacheLayer::snapshot`](crate::CacheLayer::snapshot) hands out.
///
/// # Examples
///
/// ```
/// use cdn_layer::LayerStatistics;
/// use cdn_server::LayerId;
///
/// let mut stats = LayerStatistics::new(3, LayerId::EDGE);
/// stats.set_weights(&[1.0, 1.0, 2.0]);
///
/// assert_eq!(stats.server_count(), 3);
/// assert_eq!(stats.layer_request_count(), 0);
/// assert_eq!(stats.weights(), &[1.0, 1.0, 2.0]);
/// assert_eq!(stats.hit_ratio(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "StatisticsRecord"))]
pub struct LayerStatistics {
    layer_id: LayerId,
    layer_request_count: u64,
    layer_hit_count: u64,
    requests_from_server: Box<[u64]>,
    requests_to_server: Box<[u64]>,
    hits_per_server: Box<[u64]>,
    weights: Box<[f64]>,
}

impl LayerStatistics {
    /// Creates zeroed statistics for a layer of `server_count` servers.
    #[must_use]
    pub fn new(server_count: usize, layer_id: LayerId) -> Self {
        Self {
            layer_id,
            layer_request_count: 0,
            layer_hit_count: 0,
            requests_from_server: vec![0; server_count].into(),
            requests_to_server: vec![0; server_count].into(),
            hits_per_server: vec![0; server_count].into(),
            weights: vec![0.0; server_count].into(),
        }
    }

    /// Stores a copy of the layer's routing weights for reporting.
    ///
    /// # Panics
    ///
    /// Panics if `weights` does not hold exactly one weight per server.
    pub fn set_weights(&mut self, weights: &[f64]) {
        assert_eq!(
            weights.len(),
            self.weights.len(),
            "expected one weight per server"
        );
        self.weights.copy_from_slice(weights);
    }

    /// Records one routed request.
    ///
    /// Both indices must be valid server indices; the layer validates `source` and the ring
    /// only produces valid targets.
    pub(crate) fn record(&mut self, source: usize, target: usize, hit: bool) {
        self.layer_request_count += 1;
        self.requests_from_server[source] += 1;
        self.requests_to_server[target] += 1;
        if hit {
            self.layer_hit_count += 1;
            self.hits_per_server[target] += 1;
        }
    }

    /// Returns the layer these statistics belong to.
    #[must_use]
    pub const fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    /// Returns the number of servers in the layer.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.requests_to_server.len()
    }

    /// Returns the total number of requests the layer has handled.
    #[must_use]
    pub const fn layer_request_count(&self) -> u64 {
        self.layer_request_count
    }

    /// Returns the total number of requests that hit.
    #[must_use]
    pub const fn layer_hit_count(&self) -> u64 {
        self.layer_hit_count
    }

    /// Returns, per server, how many requests named it as their source.
    #[must_use]
    pub fn requests_from_server(&self) -> &[u64] {
        &self.requests_from_server
    }

    /// Returns, per server, how many requests were routed to it.
    #[must_use]
    pub fn requests_to_server(&self) -> &[u64] {
        &self.requests_to_server
    }

    /// Returns, per server, how many routed requests hit.
    #[must_use]
    pub fn hits_per_server(&self) -> &[u64] {
        &self.hits_per_server
    }

    /// Returns the routing weights recorded with [`set_weights`](Self::set_weights).
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the fraction of all requests that hit, or `0.0` before the first request.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.layer_hit_count, self.layer_request_count)
    }

    /// Returns the fraction of requests routed to `server` that hit.
    ///
    /// Returns `None` if `server` is out of range and `Some(0.0)` if it received no requests.
    #[must_use]
    pub fn server_hit_ratio(&self, server: usize) -> Option<f64> {
        let hits = *self.hits_per_server.get(server)?;
        let routed = *self.requests_to_server.get(server)?;
        Some(ratio(hits, routed))
    }

    /// Returns the fraction of all requests that were routed to `server`.
    ///
    /// Returns `None` if `server` is out of range and `Some(0.0)` before the first request.
    #[must_use]
    pub fn request_share(&self, server: usize) -> Option<f64> {
        let routed = *self.requests_to_server.get(server)?;
        Some(ratio(routed, self.layer_request_count))
    }
}

/// Wire form of [`LayerStatistics`], checked before it becomes one.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct StatisticsRecord {
    layer_id: LayerId,
    layer_request_count: u64,
    layer_hit_count: u64,
    requests_from_server: Box<[u64]>,
    requests_to_server: Box<[u64]>,
    hits_per_server: Box<[u64]>,
    weights: Box<[f64]>,
}

#[cfg(feature = "serde")]
#[derive(Debug, thiserror::Error)]
#[error("per-server arrays disagree on the server count: {requests_from_server} sources, {requests_to_server} targets, {hits_per_server} hit counts, {weights} weights")]
struct ServerCountMismatch {
    requests_from_server: usize,
    requests_to_server: usize,
    hits_per_server: usize,
    weights: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<StatisticsRecord> for LayerStatistics {
    type Error = ServerCountMismatch;

    fn try_from(record: StatisticsRecord) -> Result<Self, Self::Error> {
        let server_count = record.requests_to_server.len();
        if record.requests_from_server.len() != server_count
            || record.hits_per_server.len() != server_count
            || record.weights.len() != server_count
        {
            return Err(ServerCountMismatch {
                requests_from_server: record.requests_from_server.len(),
                requests_to_server: server_count,
                hits_per_server: record.hits_per_server.len(),
                weights: record.weights.len(),
            });
        }

        Ok(Self {
            layer_id: record.layer_id,
            layer_request_count: record.layer_request_count,
            layer_hit_count: record.layer_hit_count,
            requests_from_server: record.requests_from_server,
            requests_to_server: record.requests_to_server,
            hits_per_server: record.hits_per_server,
            weights: record.weights,
        })
    }
}

#[expect(clippy::cast_precision_loss, reason = "ratios tolerate rounding of counts above 2^53")]
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}
