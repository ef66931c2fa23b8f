// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The contract cache layers use to reach their servers.
//!
//! [`CacheServer`] is implemented by the simulated cache nodes. A server owns its own eviction
//! and admission policy; layers only hand it requests and read its configured capacities.

use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::Keyed;

/// The 1-based number of a layer in the cache hierarchy.
///
/// Layer 1 is the edge; higher numbers sit further from clients. The id is never zero, which
/// makes [`LayerId::index`] always valid as an offset into per-layer tables.
///
/// # Examples
///
/// ```
/// use cdn_server::LayerId;
///
/// let edge = LayerId::new(1).unwrap();
/// assert_eq!(edge.get(), 1);
/// assert_eq!(edge.index(), 0);
/// assert!(LayerId::new(0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LayerId(NonZeroU32);

impl LayerId {
    /// The first (edge) layer.
    pub const EDGE: Self = Self(NonZeroU32::MIN);

    /// Creates a layer id, returning `None` for zero.
    #[must_use]
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Returns the 1-based layer number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based offset of this layer into per-layer tables.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl Display for LayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A simulated cache node that layers route requests to.
///
/// Servers are shared: the same server may sit in several layers, and several worker threads
/// may call into it at once, so every method takes `&self` and implementations synchronize
/// internally.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use std::sync::Mutex;
///
/// use cdn_server::{CacheServer, LayerId, TraceRequest};
///
/// /// Remembers every key it has seen, forever.
/// struct Unbounded {
///     capacities: Vec<u64>,
///     seen: Mutex<HashSet<u64>>,
/// }
///
/// impl CacheServer for Unbounded {
///     type Request = TraceRequest<u64>;
///
///     fn add_request(&self, request: &TraceRequest<u64>, _layer: LayerId) -> bool {
///         !self.seen.lock().unwrap().insert(*cdn_server::Keyed::key(request))
///     }
///
///     fn layer_capacities(&self) -> &[u64] {
///         &self.capacities
///     }
/// }
///
/// let server = Unbounded { capacities: vec![100], seen: Mutex::default() };
/// assert!(!server.add_request(&TraceRequest::new(1), LayerId::EDGE));
/// assert!(server.add_request(&TraceRequest::new(1), LayerId::EDGE));
/// ```
pub trait CacheServer: Send + Sync {
    /// The request type this server handles.
    type Request: Keyed + ?Sized;

    /// Handles `request` on behalf of layer `layer`, returning `true` on a cache hit.
    fn add_request(&self, request: &Self::Request, layer: LayerId) -> bool;

    /// Returns the configured capacity of this server for each layer, indexed by
    /// [`LayerId::index`].
    fn layer_capacities(&self) -> &[u64];

    /// Returns the configured capacity for `layer`, or `None` if the table has no entry for it.
    fn capacity_for(&self, layer: LayerId) -> Option<u64> {
        self.layer_capacities().get(layer.index()).copied()
    }
}

impl<S: CacheServer + ?Sized> CacheServer for Arc<S> {
    type Request = S::Request;

    fn add_request(&self, request: &Self::Request, layer: LayerId) -> bool {
        (**self).add_request(request, layer)
    }

    fn layer_capacities(&self) -> &[u64] {
        (**self).layer_capacities()
    }
}

impl<S: CacheServer + ?Sized> CacheServer for Box<S> {
    type Request = S::Request;

    fn add_request(&self, request: &Self::Request, layer: LayerId) -> bool {
        (**self).add_request(request, layer)
    }

    fn layer_capacities(&self) -> &[u64] {
        (**self).layer_capacities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceRequest;

    struct Fixed(Vec<u64>);

    impl CacheServer for Fixed {
        type Request = TraceRequest;

        fn add_request(&self, _request: &TraceRequest, layer: LayerId) -> bool {
            layer == LayerId::EDGE
        }

        fn layer_capacities(&self) -> &[u64] {
            &self.0
        }
    }

    #[test]
    fn layer_id_rejects_zero() {
        assert!(LayerId::new(0).is_none());
        assert_eq!(LayerId::new(3).map(LayerId::index), Some(2));
    }

    #[test]
    fn layer_id_display_is_one_based() {
        assert_eq!(LayerId::EDGE.to_string(), "1");
    }

    #[test]
    fn capacity_for_reads_layer_offset() {
        let server = Fixed(vec![10, 20]);
        assert_eq!(server.capacity_for(LayerId::EDGE), Some(10));
        assert_eq!(server.capacity_for(LayerId::new(2).expect("non-zero")), Some(20));
        assert_eq!(server.capacity_for(LayerId::new(3).expect("non-zero")), None);
    }

    #[test]
    fn smart_pointers_forward() {
        let server: Arc<dyn CacheServer<Request = TraceRequest>> = Arc::new(Fixed(vec![5]));
        assert!(server.add_request(&TraceRequest::new(1), LayerId::EDGE));
        assert_eq!(server.layer_capacities(), &[5]);

        let boxed = Box::new(Fixed(vec![6]));
        assert!(!boxed.add_request(&TraceRequest::new(1), LayerId::new(2).expect("non-zero")));
        assert_eq!(boxed.capacity_for(LayerId::EDGE), Some(6));
    }
}
