// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A deterministic, weight-aware consistent hash ring.
//!
//! This crate provides [`HashRing`], which maps arbitrary hashable keys to server indices such
//! that:
//!
//! 1. **Determinism:** the same key always lands on the same server, across calls and across
//!    independently built rings with identical configuration.
//! 2. **Proportionality:** the share of the keyspace owned by server `i` converges to
//!    `weight[i] / sum(weights)`.
//! 3. **Consistency:** adding a server, or changing one server's weight, only moves keys to or
//!    from that server instead of reshuffling everything like `hash % n` would.
//!
//! # Architecture
//!
//! Every server is placed on a 64-bit circular keyspace at many virtual points. The number of
//! points is proportional to the server's weight on a fixed scale: a server whose weight equals
//! the reference weight ([`DEFAULT_REFERENCE_WEIGHT`]) gets [`DEFAULT_POINTS_PER_SERVER`] points,
//! both configurable through [`RingBuilder`]. The scale does not depend on the other weights, so
//! a server whose weight is unchanged keeps exactly the same points. Point positions are derived
//! from 128-bit XXH3 digests of `(server index, replica index)`, each digest yielding two
//! positions. A ring holds at most [`MAX_TOTAL_POINTS`] points.
//!
//! A key is hashed with 64-bit XXH3 through [`std::hash::Hash`] and owned by the first point at
//! or after its hash, wrapping at the end of the keyspace.
//!
//! | Operation | Complexity |
//! | :--- | :--- |
//! | **Build** | $O(p \log p)$ for $p$ total points |
//! | **Locate** | $O(\log p)$ binary search |
//!
//! # Example
//!
//! ```
//! use weighted_ring::{HashMode, HashRing};
//!
//! // Server 2 has twice the weight of the others.
//! let ring = HashRing::build(HashMode::Xxh3, &[1.0, 1.0, 2.0])?;
//!
//! let mut counts = [0_usize; 3];
//! for key in 0_u64..10_000 {
//!     counts[ring.locate(&key)] += 1;
//! }
//! assert!(counts[2] > counts[0]);
//! assert!(counts[2] > counts[1]);
//! # Ok::<(), weighted_ring::Error>(())
//! ```
//!
//! # Configuration Errors
//!
//! Building a ring validates its configuration eagerly: an empty server list, an unsupported
//! [`HashMode`], a negative or non-finite weight, weights summing to zero, or weights so large
//! relative to the reference weight that the ring would exceed [`MAX_TOTAL_POINTS`] all fail
//! with an [`Error`] and no ring is produced.

mod error;
mod mode;
mod ring;

pub use error::{Error, Result};
pub use mode::HashMode;
pub use ring::{DEFAULT_POINTS_PER_SERVER, DEFAULT_REFERENCE_WEIGHT, HashRing, MAX_TOTAL_POINTS, RingBuilder, hash_key};
