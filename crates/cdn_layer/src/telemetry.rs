// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events emitted by cache layers.
//!
//! Events go through `tracing`. Field names are dotted and shared across events so that a log
//! pipeline can group everything one layer did by `layer.id`.

use cdn_server::LayerId;
use weighted_ring::HashMode;

#[cfg(test)]
pub(crate) const LAYER_ID: &str = "layer.id";
#[cfg(test)]
pub(crate) const LAYER_SERVERS: &str = "layer.servers";
#[cfg(test)]
pub(crate) const LAYER_OPERATION: &str = "layer.operation";
#[cfg(test)]
pub(crate) const RING_MODE: &str = "ring.mode";
#[cfg(test)]
pub(crate) const RING_POINTS: &str = "ring.points";

// Field names must match the constants above, see `field_names_match_constants`.

pub(crate) fn layer_built(layer: LayerId, servers: usize, mode: HashMode, points: usize) {
    tracing::info!(
        layer.id = layer.get(),
        layer.servers = servers,
        ring.mode = mode.as_str(),
        ring.points = points,
        "layer.built"
    );
}

pub(crate) fn capacity_weights(layer: LayerId, servers: usize) {
    tracing::warn!(
        layer.id = layer.get(),
        layer.servers = servers,
        "layer.weights: deriving routing weights from per-layer server capacity, which need not match request share"
    );
}

pub(crate) fn request_served(layer: LayerId, source: usize, target: usize, hit: bool) {
    tracing::trace!(
        layer.id = layer.get(),
        request.source = source,
        request.target = target,
        request.hit = hit,
        "layer.request"
    );
}

pub(crate) fn unsupported(layer: LayerId, operation: &'static str) {
    tracing::error!(layer.id = layer.get(), layer.operation = operation, "layer.unsupported");
}
