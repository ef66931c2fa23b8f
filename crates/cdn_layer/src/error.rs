// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layer construction and request errors.

use cdn_server::LayerId;
use thiserror::Error;

use crate::LayerHandle;

/// An error from building, wiring or feeding a cache layer.
///
/// Construction errors mean the layer was never created; there is no partially initialized
/// layer to clean up. A cache miss is not an error: [`CacheLayer::add_request`] reports it as
/// `Ok(false)`.
///
/// [`CacheLayer::add_request`]: crate::CacheLayer::add_request
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The operation or configuration is recognized but not supported.
    ///
    /// Returned by [`CacheLayer::rebalance`](crate::CacheLayer::rebalance),
    /// [`CacheLayer::add_server`](crate::CacheLayer::add_server) and by construction with a hash
    /// mode that cannot place keys on a ring.
    #[error("`{operation}` is not supported by cache layers")]
    Unsupported {
        /// Name of the unsupported operation or hash mode.
        operation: &'static str,
    },

    /// The layer was given no servers.
    #[error("a cache layer needs at least one server")]
    NoServers,

    /// Capacity-derived weighting found no capacity entry for this layer on a server.
    #[error("server {server} has no capacity configured for layer {layer}")]
    MissingCapacity {
        /// Index of the server within the layer.
        server: usize,
        /// The layer whose capacity was looked up.
        layer: LayerId,
    },

    /// Explicit weights did not provide exactly one weight per server.
    #[error("expected {expected} weights, one per server, but got {actual}")]
    WeightCount {
        /// Number of servers in the layer.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// The hash ring rejected the derived weights.
    #[error(transparent)]
    Ring(#[from] weighted_ring::Error),

    /// A layer handle does not refer to a registered layer.
    #[error("no layer is registered as {0}")]
    UnknownLayer(LayerHandle),

    /// A request named a source server that does not exist in the layer.
    #[error("source server {index} is out of range for a layer of {server_count} servers")]
    ServerOutOfRange {
        /// The rejected source index.
        index: usize,
        /// Number of servers in the layer.
        server_count: usize,
    },
}

impl Error {
    /// Returns `true` if this error reports an unsupported operation rather than a
    /// configuration mistake or a bad argument.
    ///
    /// Simulation drivers typically treat unsupported operations as fatal and stop the run.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// A specialized `Result` for cache layer operations.
pub type Result<T> = std::result::Result<T, Error>;
