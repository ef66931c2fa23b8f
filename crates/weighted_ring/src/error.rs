// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ring configuration errors.

use thiserror::Error;

use crate::HashMode;

/// A ring configuration error.
///
/// Every variant describes a mistake in how the ring was configured. None of them is a
/// transient condition: retrying the same build with the same inputs fails the same way.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The ring was asked to place zero servers.
    #[error("a hash ring needs at least one server")]
    NoServers,

    /// The requested hash mode is known but cannot place keys on a ring.
    #[error("hash mode `{0}` is not supported for ring placement")]
    UnsupportedHashMode(HashMode),

    /// A hash mode name did not match any known mode.
    #[error("unknown hash mode `{0}`")]
    UnknownHashMode(String),

    /// A server weight was negative, NaN or infinite.
    #[error("weight {weight} of server {index} is not a finite, non-negative number")]
    InvalidWeight {
        /// Index of the offending server.
        index: usize,
        /// The rejected weight.
        weight: f64,
    },

    /// Every server has a weight of zero, so no key could ever be placed.
    #[error("the weights of all servers sum to zero")]
    ZeroTotalWeight,

    /// The ring was configured with zero points per server.
    #[error("points per server must be greater than zero")]
    NoPoints,

    /// The reference weight was zero, negative, NaN or infinite.
    #[error("reference weight {0} is not a finite, positive number")]
    InvalidReferenceWeight(f64),

    /// The weights and scaling would place more points on the ring than it may hold.
    #[error("the ring would need more than {limit} points; lower points per server or raise the reference weight")]
    TooManyPoints {
        /// The maximum number of points a ring may hold.
        limit: usize,
    },
}

/// A specialized `Result` for ring construction.
pub type Result<T> = std::result::Result<T, Error>;
