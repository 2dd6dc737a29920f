//! # Cache Groups
//!
//! A group is a named cache namespace: a bounded local store, a backing
//! source consulted on miss, and an optional peer picker that routes misses
//! to the node owning the key. All loads for one key are coalesced through
//! a single-flight record, so the expensive path runs once no matter how
//! many callers pile up.
//!
//! ## Read Path
//!
//! ```text
//! get(key) ── local hit ──────────────────────────────► ByteView
//!     │ miss
//!     ▼
//! single-flight ── peer owns key ── fetch ok ─────────► ByteView (not cached here)
//!     │                │ fetch failed (logged, info)
//!     │                ▼
//!     └── backing source ── ok ── populate local ─────► ByteView
//!                          └ err ───────────────────── CacheError::Source
//! ```
//!
//! Groups register themselves in a process-wide registry at construction so
//! the HTTP transport can resolve them by name.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;

use shoal_common::{BoxError, CacheError, CacheResult};

use crate::cache::LocalCache;
use crate::flight::SingleFlight;
use crate::peer::{PeerFetcher, PeerPicker};
use crate::view::ByteView;

/// Backing source consulted when both the local store and the peers miss.
///
/// Called at most once per (group, key) per in-flight load; the returned
/// bytes become the canonical cached value.
#[async_trait]
pub trait Source: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError>;
}

/// Adapts an async closure into a [`Source`].
pub struct SourceFn<F>(pub F);

#[async_trait]
impl<F, Fut> Source for SourceFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        (self.0)(key.to_string()).await
    }
}

/// Atomic counters for one group's read path.
///
/// Record calls are zero-allocation; `Ordering::Relaxed` is sufficient
/// because the counters are independent.
#[derive(Debug, Default)]
pub struct Stats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
}

impl Stats {
    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Plain snapshot of a group's counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Calls to `get`, valid keys only.
    pub gets: u64,
    /// Gets answered from the local store.
    pub cache_hits: u64,
    /// Load executions (deduplicated callers share one load).
    pub loads: u64,
    /// Loads answered by the backing source.
    pub local_loads: u64,
    /// Backing-source failures.
    pub local_load_errors: u64,
    /// Loads answered by a remote owner.
    pub peer_loads: u64,
    /// Remote fetches that failed and fell back to the source.
    pub peer_errors: u64,
}

/// Process-wide registry: lookups take the read side, registration the
/// write side.
static GROUPS: Lazy<RwLock<HashMap<String, Arc<Group>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Looks up a registered group by name.
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    GROUPS.read().get(name).cloned()
}

/// A named cache namespace with its own store, source, and peer routing.
pub struct Group {
    name: String,
    source: Arc<dyn Source>,
    cache: LocalCache,
    /// Write-once: set by `register_peers`, read lock-free afterwards.
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: SingleFlight<ByteView>,
    stats: Stats,
}

impl Group {
    /// Creates a group and registers it under `name`.
    ///
    /// `cache_bytes` bounds the local store (`0` = unbounded). Registering
    /// a second group under an existing name replaces the first.
    pub fn new(name: impl Into<String>, cache_bytes: usize, source: Arc<dyn Source>) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group {
            name: name.clone(),
            source,
            cache: LocalCache::new(cache_bytes),
            peers: OnceLock::new(),
            flight: SingleFlight::new(),
            stats: Stats::default(),
        });
        GROUPS.write().insert(name, Arc::clone(&group));
        group
    }

    /// The group's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the group's counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Attaches the peer picker. May be called at most once per group.
    ///
    /// # Panics
    ///
    /// Panics on a second call; routing is fixed for the group's lifetime
    /// and re-registration is a programming error.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("register_peers called more than once on group {:?}", self.name);
        }
    }

    /// Returns the value for `key`, loading it on a local miss.
    pub async fn get(&self, key: &str) -> CacheResult<ByteView> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        Stats::bump(&self.stats.gets);
        if let Some(view) = self.cache.get(key) {
            Stats::bump(&self.stats.cache_hits);
            tracing::debug!(group = %self.name, key, "cache hit");
            return Ok(view);
        }

        self.load(key).await
    }

    /// Loads `key` through the single-flight record: remote owner first,
    /// then the backing source.
    async fn load(&self, key: &str) -> CacheResult<ByteView> {
        self.flight
            .run(key, async {
                Stats::bump(&self.stats.loads);

                if let Some(picker) = self.peers.get() {
                    if let Some(peer) = picker.pick_peer(key) {
                        match self.fetch_from_peer(peer.as_ref(), key).await {
                            Ok(view) => {
                                Stats::bump(&self.stats.peer_loads);
                                return Ok(view);
                            }
                            Err(err) => {
                                Stats::bump(&self.stats.peer_errors);
                                tracing::info!(
                                    group = %self.name,
                                    key,
                                    error = %err,
                                    "peer fetch failed, falling back to local source"
                                );
                            }
                        }
                    }
                }

                self.load_local(key).await
            })
            .await
    }

    /// Loads from the backing source and populates the local store.
    async fn load_local(&self, key: &str) -> CacheResult<ByteView> {
        let bytes = match self.source.get(key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                Stats::bump(&self.stats.local_load_errors);
                return Err(CacheError::source(key, err));
            }
        };

        Stats::bump(&self.stats.local_loads);
        let view = ByteView::from(bytes);
        self.cache.add(key, view.clone());
        Ok(view)
    }

    /// Fetches from the remote owner. The result is returned to the caller
    /// without populating the local store: the owner stays authoritative
    /// for its keys.
    async fn fetch_from_peer(
        &self,
        peer: &dyn PeerFetcher,
        key: &str,
    ) -> CacheResult<ByteView> {
        let bytes = peer
            .fetch(&self.name, key)
            .await
            .map_err(CacheError::peer)?;
        Ok(ByteView::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    /// Source over a fixed table, counting invocations per key.
    struct TableSource {
        rows: HashMap<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl TableSource {
        fn scores() -> Self {
            TableSource {
                rows: HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Source for TableSource {
        async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.rows.get(key) {
                Some(value) => Ok(value.as_bytes().to_vec()),
                None => Err(format!("{key} not exist").into()),
            }
        }
    }

    struct FixedFetcher {
        value: Option<&'static str>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PeerFetcher for FixedFetcher {
        async fn fetch(&self, _group: &str, _key: &str) -> Result<Vec<u8>, BoxError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.value {
                Some(value) => Ok(value.as_bytes().to_vec()),
                None => Err("peer unavailable".into()),
            }
        }
    }

    struct FixedPicker {
        fetcher: Arc<FixedFetcher>,
    }

    impl FixedPicker {
        fn new(value: Option<&'static str>) -> Self {
            FixedPicker {
                fetcher: Arc::new(FixedFetcher {
                    value,
                    fetches: AtomicUsize::new(0),
                }),
            }
        }
    }

    impl PeerPicker for FixedPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerFetcher>> {
            Some(Arc::clone(&self.fetcher) as Arc<dyn PeerFetcher>)
        }
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_any_lookup() {
        let source = Arc::new(TableSource::scores());
        let group = Group::new("t-empty-key", 1024, Arc::clone(&source) as Arc<dyn Source>);

        let result = group.get("").await;
        assert!(matches!(result, Err(CacheError::EmptyKey)));
        assert_eq!(source.calls(), 0);
        assert_eq!(group.stats().gets, 0);
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let source = Arc::new(TableSource::scores());
        let group = Group::new("t-cache-hit", 1024, Arc::clone(&source) as Arc<dyn Source>);

        let first = group.get("Tom").await.expect("load");
        assert_eq!(first.as_bytes(), b"630");
        let second = group.get("Tom").await.expect("hit");
        assert_eq!(second.as_bytes(), b"630");

        assert_eq!(source.calls(), 1);
        let stats = group.stats();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    async fn source_error_surfaces_to_the_caller() {
        let source = Arc::new(TableSource::scores());
        let group = Group::new("t-source-error", 1024, source as Arc<dyn Source>);

        let result = group.get("Unknown").await;
        assert!(matches!(result, Err(CacheError::Source { .. })));
        assert_eq!(group.stats().local_load_errors, 1);
    }

    #[tokio::test]
    async fn failing_peer_falls_back_to_local_source() {
        let source = Arc::new(TableSource::scores());
        let group = Group::new("t-peer-fallback", 1024, Arc::clone(&source) as Arc<dyn Source>);
        group.register_peers(Arc::new(FixedPicker::new(None)));

        let view = group.get("Tom").await.expect("fallback");
        assert_eq!(view.as_bytes(), b"630");
        assert_eq!(source.calls(), 1);

        let stats = group.stats();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    async fn peer_value_is_not_cached_locally() {
        let source = Arc::new(TableSource::scores());
        let group = Group::new("t-peer-no-populate", 1024, source as Arc<dyn Source>);
        let picker = FixedPicker::new(Some("remote"));
        let fetcher = Arc::clone(&picker.fetcher);
        group.register_peers(Arc::new(picker));

        for _ in 0..2 {
            let view = group.get("Tom").await.expect("peer value");
            assert_eq!(view.as_bytes(), b"remote");
        }

        // Every get went back to the peer: the value never entered the
        // local store.
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(group.stats().peer_loads, 2);
        assert_eq!(group.stats().cache_hits, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_misses_hit_the_source_once() {
        struct SlowSource {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl Source for SlowSource {
            async fn get(&self, _key: &str) -> Result<Vec<u8>, BoxError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(b"slow".to_vec())
            }
        }

        let source = Arc::new(SlowSource {
            calls: AtomicUsize::new(0),
        });
        let group = Group::new("t-coalesce", 1024, Arc::clone(&source) as Arc<dyn Source>);

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let group = Arc::clone(&group);
            tasks.push(tokio::spawn(async move { group.get("k").await }));
        }
        for task in tasks {
            let view = task.await.expect("join").expect("load");
            assert_eq!(view.as_bytes(), b"slow");
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "register_peers called more than once")]
    async fn double_peer_registration_panics() {
        let group = Group::new(
            "t-double-register",
            1024,
            Arc::new(TableSource::scores()) as Arc<dyn Source>,
        );
        group.register_peers(Arc::new(FixedPicker::new(None)));
        group.register_peers(Arc::new(FixedPicker::new(None)));
    }

    #[tokio::test]
    async fn registry_resolves_groups_by_name() {
        let group = Group::new(
            "t-registry",
            1024,
            Arc::new(TableSource::scores()) as Arc<dyn Source>,
        );
        let found = get_group("t-registry").expect("registered");
        assert!(Arc::ptr_eq(&group, &found));
        assert!(get_group("t-registry-missing").is_none());
    }

    #[tokio::test]
    async fn closure_sources_adapt_via_source_fn() {
        let group = Group::new(
            "t-source-fn",
            1024,
            Arc::new(SourceFn(|key: String| async move {
                Ok::<_, BoxError>(format!("value-for-{key}").into_bytes())
            })) as Arc<dyn Source>,
        );

        let view = group.get("alpha").await.expect("load");
        assert_eq!(view.as_bytes(), b"value-for-alpha");
    }
}
