//! # HTTP Peer Pool
//!
//! One pool per node: it knows the node's own address, the ring assigning
//! keys to peers, and an HTTP fetcher per peer. The pool implements
//! [`PeerPicker`] so groups can route misses, and (via [`HttpPool::router`])
//! serves the peer protocol to other nodes.
//!
//! ## Locking
//!
//! A single mutex guards the ring and the fetcher map. `set_peers` swaps
//! both wholesale; a fetcher handed out by an earlier `pick_peer` stays
//! valid because fetchers are reference counted and own nothing but a base
//! URL and a shared HTTP client.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use shoal_cache::{HashRing, PeerFetcher, PeerPicker};
use shoal_client::HttpFetcher;

/// Default path prefix for peer traffic.
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

/// Default virtual nodes per peer on the ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Ring and fetcher map, swapped together by `set_peers`.
struct Routes {
    ring: HashRing,
    fetchers: HashMap<String, Arc<HttpFetcher>>,
}

/// Peer pool for one node.
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    replicas: usize,
    /// Shared by every fetcher so connections are pooled across peers.
    client: reqwest::Client,
    routes: Mutex<Routes>,
}

impl HttpPool {
    /// Creates a pool for the node listening at `self_addr`, with the
    /// default base path and replica count.
    pub fn new(self_addr: &str) -> Self {
        Self::with_options(self_addr, DEFAULT_BASE_PATH, DEFAULT_REPLICAS)
    }

    /// Creates a pool with an explicit base path and ring replica count.
    pub fn with_options(self_addr: &str, base_path: &str, replicas: usize) -> Self {
        let mut base_path = base_path.to_string();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }

        HttpPool {
            self_addr: normalize_addr(self_addr),
            base_path,
            replicas,
            client: reqwest::Client::new(),
            routes: Mutex::new(Routes {
                ring: HashRing::new(replicas),
                fetchers: HashMap::new(),
            }),
        }
    }

    /// This node's normalized address.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// The slash-terminated path prefix for peer traffic.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Replaces the peer set: builds a fresh ring and fetcher map and swaps
    /// them in under the lock. The list should include this node's own
    /// address so the ring can assign keys to it.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers
            .into_iter()
            .map(|peer| normalize_addr(peer.as_ref()))
            .collect();

        let mut ring = HashRing::new(self.replicas);
        ring.add_nodes(&peers);

        let mut fetchers = HashMap::with_capacity(peers.len());
        for peer in peers {
            let base_url = format!("{}{}", peer, self.base_path);
            fetchers.insert(
                peer,
                Arc::new(HttpFetcher::new(self.client.clone(), base_url)),
            );
        }

        let mut routes = self.routes.lock();
        routes.ring = ring;
        routes.fetchers = fetchers;
    }
}

impl PeerPicker for HttpPool {
    /// Returns the fetcher for the peer owning `key`, or `None` when the
    /// ring is empty or assigns the key to this node.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
        let routes = self.routes.lock();
        let owner = routes.ring.locate(key)?;
        if owner == self.self_addr {
            return None;
        }

        let fetcher = routes.fetchers.get(owner).cloned()?;
        tracing::debug!(server = %self.self_addr, peer = %owner, key, "picked remote owner");
        Some(fetcher as Arc<dyn PeerFetcher>)
    }
}

/// Normalizes a peer address for ring membership and self-comparison:
/// prepends the default scheme when missing and strips trailing slashes.
fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
