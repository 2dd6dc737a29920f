//! # Shoalcache Peer Client
//!
//! HTTP client for fetching cached values from a remote owner. One
//! [`HttpFetcher`] addresses one peer; all fetchers of a pool share a
//! single `reqwest` client so connections are reused across peers.

mod fetch;

pub use fetch::{FetchError, FetchResult, HttpFetcher};
