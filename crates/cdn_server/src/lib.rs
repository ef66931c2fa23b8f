// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache server and request contracts for simulated CDN cache layers.
//!
//! This crate defines the [`CacheServer`] trait that simulated cache nodes implement, the
//! [`Keyed`] trait that gives requests a stable routing key, [`TraceRequest`] as a ready-made
//! request type, and [`LayerId`] for addressing per-layer configuration.
//!
//! # Overview
//!
//! A cache layer routes each request to one of its servers and asks that server to handle it.
//! The server decides hit or miss using its own eviction and admission policy, which this
//! crate deliberately knows nothing about. The only configuration a layer reads from a server
//! is its per-layer capacity table.
//!
//! # Implementing a Server
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use cdn_server::{CacheServer, LayerId, TraceRequest};
//!
//! /// Never caches anything.
//! struct Passthrough {
//!     capacities: Vec<u64>,
//!     served: AtomicU64,
//! }
//!
//! impl CacheServer for Passthrough {
//!     type Request = TraceRequest;
//!
//!     fn add_request(&self, _request: &TraceRequest, _layer: LayerId) -> bool {
//!         self.served.fetch_add(1, Ordering::Relaxed);
//!         false
//!     }
//!
//!     fn layer_capacities(&self) -> &[u64] {
//!         &self.capacities
//!     }
//! }
//! ```
//!
//! # Testing
//!
//! Enable the `test-util` feature for `testing::MockServer`, which records every request and
//! lets tests control which requests hit.

mod request;
mod server;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use request::{Keyed, TraceRequest};
#[doc(inline)]
pub use server::{CacheServer, LayerId};
