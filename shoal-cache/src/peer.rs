//! # Peer Contracts
//!
//! The two seams a transport implements to plug remote peers into a group:
//! picking the owner of a key, and fetching a value from that owner. The
//! HTTP implementations live in `shoal-server` and `shoal-client`.

use std::sync::Arc;

use async_trait::async_trait;

use shoal_common::BoxError;

/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns a fetcher for the owning peer, or `None` when the calling
    /// node owns the key itself (or no peers are configured).
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Retrieves a cached value from a remote owner.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Fetches the value for `key` in `group` from the remote peer.
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>, BoxError>;
}
