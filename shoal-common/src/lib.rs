//! # Shoalcache Common
//!
//! Shared definitions for the Shoalcache workspace: the error type every
//! crate speaks, and the wire messages exchanged between peers.

pub mod error;
pub mod wire;

pub use error::{BoxError, CacheError, CacheResult};
pub use wire::{FetchRequest, FetchResponse};
