// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Keyed request contract and the trace request type.

use std::hash::Hash;

/// A request that carries a stable, hashable key.
///
/// Cache layers route requests by hashing this key, so it must not change for the lifetime of
/// the request and must hash identically every time. Layers never mutate requests.
///
/// # Examples
///
/// ```
/// use cdn_server::Keyed;
///
/// struct Fetch {
///     url: String,
/// }
///
/// impl Keyed for Fetch {
///     type Key = str;
///
///     fn key(&self) -> &str {
///         &self.url
///     }
/// }
///
/// let fetch = Fetch { url: "/index.html".to_string() };
/// assert_eq!(fetch.key(), "/index.html");
/// ```
pub trait Keyed {
    /// The key type used for routing.
    type Key: Hash + ?Sized;

    /// Returns the routing key.
    fn key(&self) -> &Self::Key;
}

/// One request read from a trace.
///
/// `TraceRequest` pairs an object key with the metadata trace readers typically produce. Only
/// the key takes part in routing; size and timestamp are carried for the servers' benefit.
///
/// # Examples
///
/// ```
/// use cdn_server::{Keyed, TraceRequest};
///
/// let request = TraceRequest::new(42_u64).with_size(1024).with_timestamp(1_500_000_000);
/// assert_eq!(*request.key(), 42);
/// assert_eq!(request.size(), 1024);
/// assert_eq!(request.timestamp(), 1_500_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceRequest<K = u64> {
    key: K,
    size: u64,
    timestamp: u64,
}

impl<K> TraceRequest<K> {
    /// Creates a request for `key` with zero size and timestamp.
    #[must_use]
    pub const fn new(key: K) -> Self {
        Self { key, size: 0, timestamp: 0 }
    }

    /// Sets the object size in bytes.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the request timestamp, in trace units.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the object size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the request timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Consumes the request, returning its key.
    #[must_use]
    pub fn into_key(self) -> K {
        self.key
    }
}

impl<K: Hash> Keyed for TraceRequest<K> {
    type Key = K;

    fn key(&self) -> &K {
        &self.key
    }
}
