// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layer registry and next-layer chaining.

use std::fmt::{Debug, Display, Formatter};

use cdn_server::CacheServer;
use parking_lot::Mutex;

use crate::{CacheLayer, Error, LayerStatistics, Result};

/// A non-owning reference to a layer registered in a [`CacheHierarchy`].
///
/// Handles are plain indices. They stay valid for as long as the registry they came from, and
/// holding one never keeps a layer alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerHandle(usize);

impl LayerHandle {
    /// Creates a handle for registry slot `index`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the registry slot this handle refers to.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl Display for LayerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// An ordered registry of cache layers that owns them and wires their chain.
///
/// Each layer lives behind its own [`Mutex`], so worker threads can feed different layers in
/// parallel while requests to any one layer stay serialized. Layers refer to their successor by
/// [`LayerHandle`], never by ownership.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cdn_layer::{CacheHierarchy, CacheLayer, WeightSource};
/// use cdn_server::testing::MockServer;
/// use cdn_server::{LayerId, TraceRequest};
///
/// let mut hierarchy = CacheHierarchy::new();
/// for id in 1..=2 {
///     let servers = (0..2).map(|_| Arc::new(MockServer::<u64>::uniform(100, 2))).collect();
///     let layer = CacheLayer::builder(LayerId::new(id).unwrap())
///         .weights(WeightSource::Uniform)
///         .build(servers)?;
///     hierarchy.push(layer);
/// }
///
/// let edge = cdn_layer::LayerHandle::new(0);
/// let mid = cdn_layer::LayerHandle::new(1);
/// hierarchy.link(edge, mid)?;
/// assert_eq!(hierarchy.chain(edge), vec![edge, mid]);
///
/// if let Some(layer) = hierarchy.get(edge) {
///     layer.lock().add_request(0, &TraceRequest::new(1))?;
/// }
/// assert_eq!(hierarchy.snapshots()[0].layer_request_count(), 1);
/// # Ok::<(), cdn_layer::Error>(())
/// ```
pub struct CacheHierarchy<S: CacheServer + ?Sized> {
    layers: Vec<Mutex<CacheLayer<S>>>,
}

impl<S: CacheServer + ?Sized> Debug for CacheHierarchy<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHierarchy").field("layers", &self.layers.len()).finish()
    }
}

impl<S: CacheServer + ?Sized> Default for CacheHierarchy<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CacheServer + ?Sized> CacheHierarchy<S> {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Registers `layer` and returns its handle.
    pub fn push(&mut self, layer: CacheLayer<S>) -> LayerHandle {
        self.layers.push(Mutex::new(layer));
        LayerHandle(self.layers.len() - 1)
    }

    /// Returns the layer behind `handle`, or `None` if it is not registered here.
    #[must_use]
    pub fn get(&self, handle: LayerHandle) -> Option<&Mutex<CacheLayer<S>>> {
        self.layers.get(handle.0)
    }

    /// Returns the number of registered layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Makes `to` the next layer of `from`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLayer`] if either handle is not registered here; no link is
    /// changed in that case.
    pub fn link(&self, from: LayerHandle, to: LayerHandle) -> Result<()> {
        if self.get(to).is_none() {
            return Err(Error::UnknownLayer(to));
        }
        self.get(from).ok_or(Error::UnknownLayer(from))?.lock().set_next_layer(to);
        Ok(())
    }

    /// Returns the chain of layers starting at `start`, following next-layer links.
    ///
    /// The walk stops at a layer without a successor, at a handle that is not registered, or
    /// when a layer would be visited twice, so a miswired cycle is reported once rather than
    /// followed forever. An unknown `start` yields an empty chain.
    #[must_use]
    pub fn chain(&self, start: LayerHandle) -> Vec<LayerHandle> {
        let mut visited = vec![false; self.layers.len()];
        let mut chain = Vec::new();
        let mut current = Some(start);

        while let Some(handle) = current {
            let Some(layer) = self.get(handle) else { break };
            if std::mem::replace(&mut visited[handle.0], true) {
                break;
            }
            chain.push(handle);
            current = layer.lock().next_layer();
        }

        chain
    }

    /// Returns a snapshot of every layer's statistics in registration order.
    ///
    /// Each snapshot is taken under that layer's lock; snapshots of different layers are not
    /// taken at the same instant.
    #[must_use]
    pub fn snapshots(&self) -> Vec<LayerStatistics> {
        self.layers.iter().map(|layer| layer.lock().snapshot()).collect()
    }
}
