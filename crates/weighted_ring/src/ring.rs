// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Weighted consistent hash ring.
//!
//! This module provides the main [`HashRing`] type and its builder.

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::{Xxh3, xxh3_128};

use crate::{Error, HashMode, Result};

/// Number of ring points given to a server whose weight equals the reference weight.
pub const DEFAULT_POINTS_PER_SERVER: usize = 400;

/// Weight that maps to exactly `points_per_server` points unless the builder overrides it.
pub const DEFAULT_REFERENCE_WEIGHT: f64 = 1.0;

/// Upper bound on the number of points a single ring may hold.
pub const MAX_TOTAL_POINTS: usize = 1 << 23;

/// A single virtual position on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Point {
    position: u64,
    server: usize,
}

/// A deterministic, weight-aware mapping from keys to server indices.
///
/// Each server is hashed onto a 64-bit circular keyspace at a number of virtual points
/// proportional to its weight. A key is hashed onto the same keyspace and owned by the first
/// point at or after it, wrapping around at the end.
///
/// The ring is a pure function of its hash mode, weights and point scaling: two rings built
/// from the same inputs route every key identically. A server's points depend only on its own
/// index and weight, so changing one server's weight moves keys to or from that server alone.
///
/// # Examples
///
/// ```
/// use weighted_ring::{HashMode, HashRing};
///
/// let ring = HashRing::build(HashMode::Xxh3, &[1.0, 1.0, 2.0])?;
/// assert_eq!(ring.server_count(), 3);
///
/// let server = ring.locate("object-42");
/// assert!(server < 3);
/// assert_eq!(server, ring.locate("object-42"));
/// # Ok::<(), weighted_ring::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HashRing {
    points: Box<[Point]>,
    points_per_server: Box<[usize]>,
    weights: Box<[f64]>,
    mode: HashMode,
}

impl HashRing {
    /// Builds a ring for `weights.len()` servers with the default number of points per server.
    ///
    /// # Errors
    ///
    /// Returns an error if `weights` is empty, if `mode` is not supported, if any weight is
    /// negative or not finite, if all weights are zero, or if the ring would need more than
    /// [`MAX_TOTAL_POINTS`] points.
    pub fn build(mode: HashMode, weights: &[f64]) -> Result<Self> {
        Self::builder().hash_mode(mode).build(weights)
    }

    /// Creates a new builder for configuring a `HashRing`.
    #[must_use]
    pub fn builder() -> RingBuilder {
        RingBuilder::new()
    }

    /// Returns the index of the server owning `key`.
    #[must_use]
    pub fn locate<K: Hash + ?Sized>(&self, key: &K) -> usize {
        self.locate_hash(hash_key(key))
    }

    /// Returns the index of the server owning a precomputed key hash.
    ///
    /// The hash must come from the same function [`HashRing::locate`] uses, see [`hash_key`].
    #[must_use]
    pub fn locate_hash(&self, hash: u64) -> usize {
        let index = self.points.partition_point(|point| point.position < hash);
        // Past the last point the ring wraps to the first one.
        let point = self.points.get(index).unwrap_or(&self.points[0]);
        point.server
    }

    /// Returns the number of servers on the ring.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.points_per_server.len()
    }

    /// Returns the total number of virtual points on the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the ring has no points. A successfully built ring is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the number of virtual points owned by `server`, or `None` for an unknown index.
    #[must_use]
    pub fn points_for(&self, server: usize) -> Option<usize> {
        self.points_per_server.get(server).copied()
    }

    /// Returns the weights the ring was built from.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the hash mode used for placement.
    #[must_use]
    pub const fn hash_mode(&self) -> HashMode {
        self.mode
    }
}

/// Hashes a key onto the ring keyspace.
///
/// This is the key hash used by [`HashRing::locate`]. Callers routing the same key through
/// several rings can compute it once and use [`HashRing::locate_hash`].
#[must_use]
pub fn hash_key<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = Xxh3::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Builder for configuring a [`HashRing`].
///
/// # Examples
///
/// ```
/// use weighted_ring::{HashMode, HashRing};
///
/// let ring = HashRing::builder()
///     .hash_mode(HashMode::Xxh3)
///     .points_per_server(160)
///     .build(&[1.0, 1.0])?;
///
/// assert_eq!(ring.len(), 320);
/// # Ok::<(), weighted_ring::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct RingBuilder {
    mode: HashMode,
    points_per_server: usize,
    reference_weight: f64,
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Defaults:
    /// - `hash_mode`: [`HashMode::Xxh3`]
    /// - `points_per_server`: [`DEFAULT_POINTS_PER_SERVER`]
    /// - `reference_weight`: [`DEFAULT_REFERENCE_WEIGHT`]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: HashMode::Xxh3,
            points_per_server: DEFAULT_POINTS_PER_SERVER,
            reference_weight: DEFAULT_REFERENCE_WEIGHT,
        }
    }

    /// Sets the hash mode used for placement.
    #[must_use]
    pub const fn hash_mode(mut self, mode: HashMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of points a server of reference weight receives.
    ///
    /// More points give a smoother distribution at the cost of a larger ring.
    #[must_use]
    pub const fn points_per_server(mut self, points: usize) -> Self {
        self.points_per_server = points;
        self
    }

    /// Sets the weight that receives exactly `points_per_server` points.
    ///
    /// Weights measured in large units, such as capacities in bytes, need a matching reference
    /// weight to keep the ring under [`MAX_TOTAL_POINTS`]. Keep it fixed across rebuilds so that
    /// servers whose weight did not change keep their points.
    #[must_use]
    pub const fn reference_weight(mut self, weight: f64) -> Self {
        self.reference_weight = weight;
        self
    }

    /// Builds the ring for `weights.len()` servers.
    ///
    /// Server `i` receives `round(weights[i] / reference_weight * points_per_server)` points,
    /// at least one if its weight is positive and none if it is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if `weights` is empty, if the hash mode is not supported, if any weight
    /// is negative or not finite, if all weights are zero, if `points_per_server` is zero, if the
    /// reference weight is not a finite positive number, or if the ring would need more than
    /// [`MAX_TOTAL_POINTS`] points.
    pub fn build(&self, weights: &[f64]) -> Result<HashRing> {
        if weights.is_empty() {
            return Err(Error::NoServers);
        }
        if !self.mode.is_supported() {
            return Err(Error::UnsupportedHashMode(self.mode));
        }
        if self.points_per_server == 0 {
            return Err(Error::NoPoints);
        }
        if !self.reference_weight.is_finite() || self.reference_weight <= 0.0 {
            return Err(Error::InvalidReferenceWeight(self.reference_weight));
        }
        if let Some((index, &weight)) = weights.iter().enumerate().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidWeight { index, weight });
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(Error::ZeroTotalWeight);
        }

        let points_per_server = weights
            .iter()
            .map(|&w| self.point_count(w))
            .collect::<Result<Box<[usize]>>>()?;
        let total_points = points_per_server
            .iter()
            .try_fold(0_usize, |sum, &count| sum.checked_add(count).filter(|&total| total <= MAX_TOTAL_POINTS))
            .ok_or(Error::TooManyPoints { limit: MAX_TOTAL_POINTS })?;

        let mut points = Vec::with_capacity(total_points);
        for (server, &count) in points_per_server.iter().enumerate() {
            place_server(&mut points, server, count);
        }
        points.sort_unstable();
        // Two servers landing on the same position: the lower index keeps it.
        points.dedup_by_key(|point| point.position);

        tracing::debug!(
            ring.mode = self.mode.as_str(),
            ring.servers = weights.len(),
            ring.points = points.len(),
            "ring.built"
        );

        Ok(HashRing {
            points: points.into_boxed_slice(),
            points_per_server,
            weights: weights.into(),
            mode: self.mode,
        })
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "the scaled weight is finite, non-negative and checked against MAX_TOTAL_POINTS before the cast"
    )]
    fn point_count(&self, weight: f64) -> Result<usize> {
        if weight <= 0.0 {
            return Ok(0);
        }
        let scaled = (weight / self.reference_weight * self.points_per_server as f64).round();
        if !scaled.is_finite() || scaled > MAX_TOTAL_POINTS as f64 {
            return Err(Error::TooManyPoints { limit: MAX_TOTAL_POINTS });
        }
        Ok((scaled as usize).max(1))
    }
}

/// Appends `count` points for `server`, two per 128-bit digest.
fn place_server(points: &mut Vec<Point>, server: usize, count: usize) {
    let mut replica: u64 = 0;
    let mut remaining = count;
    while remaining > 0 {
        let mut seed = [0_u8; 16];
        seed[..8].copy_from_slice(&(server as u64).to_le_bytes());
        seed[8..].copy_from_slice(&replica.to_le_bytes());
        let digest = xxh3_128(&seed);

        #[expect(clippy::cast_possible_truncation, reason = "splitting the digest into its two halves")]
        let halves = [(digest >> 64) as u64, digest as u64];
        for position in halves.into_iter().take(remaining) {
            points.push(Point { position, server });
        }

        remaining = remaining.saturating_sub(2);
        replica += 1;
    }
}
