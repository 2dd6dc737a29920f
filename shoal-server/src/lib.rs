//! # Shoalcache Server
//!
//! The node-facing half of the transport: an HTTP pool that serves this
//! node's groups to its peers and routes outgoing misses to the peer that
//! owns the key under the consistent-hash ring.

mod http;
mod pool;

pub use pool::{HttpPool, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
