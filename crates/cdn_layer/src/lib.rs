// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Weighted request routing and per-server statistics for one tier of a simulated CDN cache
//! hierarchy.
//!
//! A [`CacheLayer`] owns the routing decision for one tier (edge, mid, origin) of a trace-driven
//! CDN simulation. For every request it:
//!
//! 1. picks a server with a weighted consistent hash ring, so that each server's share of the
//!    keyspace follows its weight and the mapping stays stable;
//! 2. hands the request to that server, which decides hit or miss by its own policy;
//! 3. updates the layer's [`LayerStatistics`] for the request as one unit.
//!
//! Layers are assembled into a chain through a [`CacheHierarchy`], which owns them and hands
//! out non-owning [`LayerHandle`]s.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use cdn_layer::CacheLayer;
//! use cdn_server::testing::MockServer;
//! use cdn_server::{LayerId, TraceRequest};
//! use weighted_ring::HashMode;
//!
//! // Three servers whose edge capacities are 1:1:2, so the third one gets about half the keys.
//! let servers = vec![
//!     Arc::new(MockServer::<u64>::with_capacities(vec![1])),
//!     Arc::new(MockServer::<u64>::with_capacities(vec![1])),
//!     Arc::new(MockServer::<u64>::with_capacities(vec![2])),
//! ];
//! let mut layer = CacheLayer::new(servers, LayerId::EDGE, HashMode::Xxh3)?;
//!
//! for key in 0..1_000 {
//!     layer.add_request(0, &TraceRequest::new(key))?;
//! }
//!
//! let stats = layer.snapshot();
//! assert_eq!(stats.layer_request_count(), 1_000);
//! assert!(stats.requests_to_server()[2] > stats.requests_to_server()[0]);
//! # Ok::<(), cdn_layer::Error>(())
//! ```
//!
//! # Weights
//!
//! By default a server's weight is its configured capacity for the layer, read from
//! [`CacheServer::layer_capacities`](cdn_server::CacheServer::layer_capacities). Capacity does
//! not necessarily predict how much traffic a server should take, so building a layer this way
//! logs a warning. [`WeightSource::Uniform`] and [`WeightSource::Explicit`] decouple the two.
//!
//! Ring points are scaled against a fixed reference weight, so capacities in large units need
//! [`CacheLayerBuilder::reference_weight`] set to a typical capacity. Otherwise the ring would
//! exceed [`weighted_ring::MAX_TOTAL_POINTS`] and construction fails.
//!
//! # Errors
//!
//! Construction fails with an [`Error`] when there are no servers, the hash mode cannot place
//! keys on a ring, or the weights cannot be derived. [`CacheLayer::rebalance`] and
//! [`CacheLayer::add_server`] always fail with [`Error::Unsupported`]: a layer's membership is
//! fixed once built.
//!
//! # Logging
//!
//! Layers emit `tracing` events: `layer.built` at `info` on construction, a `warn` for
//! capacity-derived weights, `layer.unsupported` at `error`, and `layer.request` at `trace` for
//! every request.

mod config;
mod error;
mod hierarchy;
mod layer;
mod stats;
mod telemetry;

pub use config::{LayerConfig, WeightSource};
pub use error::{Error, Result};
pub use hierarchy::{CacheHierarchy, LayerHandle};
pub use layer::{CacheLayer, CacheLayerBuilder};
pub use stats::LayerStatistics;
