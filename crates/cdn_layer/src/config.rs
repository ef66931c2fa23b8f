// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layer configuration.

use std::sync::Arc;

use cdn_server::{CacheServer, LayerId};
use weighted_ring::{DEFAULT_POINTS_PER_SERVER, DEFAULT_REFERENCE_WEIGHT, HashMode};

use crate::{Error, Result, telemetry};

/// Where a layer takes its per-server routing weights from.
///
/// Weights are computed once, when the layer is built, and never change afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum WeightSource {
    /// Each server is weighted by its configured capacity for this layer.
    ///
    /// Capacity and request share are different things, so building a layer this way logs a
    /// warning. A server without a capacity entry for the layer fails the build.
    #[default]
    LayerCapacity,

    /// Every server gets the same weight.
    Uniform,

    /// One weight per server, in server order.
    Explicit(Vec<f64>),
}

impl WeightSource {
    pub(crate) fn derive<S>(&self, servers: &[Arc<S>], layer: LayerId) -> Result<Vec<f64>>
    where
        S: CacheServer + ?Sized,
    {
        match self {
            Self::LayerCapacity => {
                telemetry::capacity_weights(layer, servers.len());
                servers
                    .iter()
                    .enumerate()
                    .map(|(server, s)| {
                        s.capacity_for(layer)
                            .map(capacity_weight)
                            .ok_or(Error::MissingCapacity { server, layer })
                    })
                    .collect()
            }
            Self::Uniform => Ok(vec![1.0; servers.len()]),
            Self::Explicit(weights) if weights.len() == servers.len() => Ok(weights.clone()),
            Self::Explicit(weights) => Err(Error::WeightCount {
                expected: servers.len(),
                actual: weights.len(),
            }),
        }
    }
}

#[expect(clippy::cast_precision_loss, reason = "capacities are weights, exact values above 2^53 do not matter")]
fn capacity_weight(capacity: u64) -> f64 {
    capacity as f64
}

/// Settings for building a [`CacheLayer`](crate::CacheLayer).
///
/// With the `serde` feature, a `LayerConfig` can be loaded from the configuration files of a
/// simulation driver; missing fields take their default values.
///
/// # Examples
///
/// ```
/// use cdn_layer::{LayerConfig, WeightSource};
/// use weighted_ring::HashMode;
///
/// let config = LayerConfig::default();
/// assert_eq!(config.hash_mode, HashMode::Xxh3);
/// assert_eq!(config.weights, WeightSource::LayerCapacity);
/// assert_eq!(config.points_per_server, weighted_ring::DEFAULT_POINTS_PER_SERVER);
/// assert_eq!(config.reference_weight, weighted_ring::DEFAULT_REFERENCE_WEIGHT);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct LayerConfig {
    /// How keys and server points are hashed onto the ring.
    pub hash_mode: HashMode,
    /// Where per-server weights come from.
    pub weights: WeightSource,
    /// Ring points given to a server whose weight equals `reference_weight`.
    pub points_per_server: usize,
    /// Weight that receives exactly `points_per_server` points.
    ///
    /// Capacity-derived weights are in the servers' capacity units; set this to a typical
    /// capacity so the ring stays small.
    pub reference_weight: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            hash_mode: HashMode::default(),
            weights: WeightSource::default(),
            points_per_server: DEFAULT_POINTS_PER_SERVER,
            reference_weight: DEFAULT_REFERENCE_WEIGHT,
        }
    }
}
