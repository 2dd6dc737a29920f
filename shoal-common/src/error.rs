//! # Error Types
//!
//! One error enum for the whole workspace. The enum is `Clone` because the
//! load coalescer hands a single load result to every waiting caller;
//! foreign errors are therefore held behind `Arc`.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error for the user-facing seams (backing sources, peer fetchers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the workspace.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the cache read path.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Rejected at the group entry point before any lookup happens.
    #[error("key must not be empty")]
    EmptyKey,

    /// The named group is not registered in this process.
    #[error("no cache group named {0:?}")]
    NoSuchGroup(String),

    /// The backing source failed; surfaced to the caller unchanged.
    #[error("backing source failed for key {key:?}: {inner}")]
    Source { key: String, inner: Arc<BoxError> },

    /// A remote owner failed to deliver a value. Recovered inside the load
    /// path by falling back to the local source; visible to callers only
    /// through peer clients used directly.
    #[error("peer fetch failed: {0}")]
    PeerFetch(Arc<BoxError>),

    /// The caller executing a coalesced load was dropped before it could
    /// publish a result.
    #[error("load interrupted before completion")]
    LoadInterrupted,
}

impl CacheError {
    /// Wraps a backing-source error for `key`.
    pub fn source(key: &str, inner: BoxError) -> Self {
        CacheError::Source {
            key: key.to_string(),
            inner: Arc::new(inner),
        }
    }

    /// Wraps a peer transport or decoding error.
    pub fn peer(inner: BoxError) -> Self {
        CacheError::PeerFetch(Arc::new(inner))
    }
}
