//! End-to-end tests over real sockets: groups registered in this process,
//! served by the pool's router, queried with the HTTP peer client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use shoal_cache::{Group, PeerFetcher, PeerPicker, Source, SourceFn};
use shoal_client::HttpFetcher;
use shoal_common::BoxError;
use shoal_server::HttpPool;

/// Binds an ephemeral port, serves the pool's router on it, and returns the
/// pool plus its normalized address.
async fn start_node() -> (Arc<HttpPool>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = format!("http://{}", listener.local_addr().expect("addr"));
    let pool = Arc::new(HttpPool::new(&addr));

    let app = Arc::clone(&pool).router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (pool, addr)
}

fn echo_source() -> Arc<dyn Source> {
    Arc::new(SourceFn(|key: String| async move {
        Ok::<_, BoxError>(format!("value:{key}").into_bytes())
    }))
}

#[tokio::test]
async fn peer_protocol_serves_registered_groups() {
    Group::new("e2e-echo", 1 << 20, echo_source());
    let (_pool, addr) = start_node().await;

    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{addr}/_geecache/"));
    let value = fetcher.get("e2e-echo", "Tom").await.expect("fetch");
    assert_eq!(value, b"value:Tom");
}

#[tokio::test]
async fn encoded_keys_round_trip() {
    Group::new("e2e-encoded", 1 << 20, echo_source());
    let (_pool, addr) = start_node().await;

    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{addr}/_geecache/"));
    let value = fetcher.get("e2e-encoded", "a b/c").await.expect("fetch");
    assert_eq!(value, b"value:a b/c");
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let (_pool, addr) = start_node().await;

    let response = reqwest::get(format!("{addr}/_geecache/e2e-nope/key"))
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn malformed_paths_are_bad_requests() {
    let (_pool, addr) = start_node().await;

    for path in ["/_geecache/solo", "/_geecache/group/"] {
        let response = reqwest::get(format!("{addr}{path}")).await.expect("send");
        assert_eq!(response.status().as_u16(), 400, "path {path}");
    }
}

#[tokio::test]
async fn failed_loads_are_internal_errors() {
    Group::new(
        "e2e-failing",
        1 << 20,
        Arc::new(SourceFn(|_key: String| async move {
            Err::<Vec<u8>, BoxError>("backing store offline".into())
        })) as Arc<dyn Source>,
    );
    let (_pool, addr) = start_node().await;

    let response = reqwest::get(format!("{addr}/_geecache/e2e-failing/key"))
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn serving_node_caches_after_first_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source_calls = Arc::clone(&calls);
    Group::new(
        "e2e-counting",
        1 << 20,
        Arc::new(SourceFn(move |key: String| {
            let calls = Arc::clone(&source_calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(format!("value:{key}").into_bytes())
            }
        })) as Arc<dyn Source>,
    );
    let (_pool, addr) = start_node().await;

    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{addr}/_geecache/"));
    for _ in 0..3 {
        let value = fetcher.get("e2e-counting", "Tom").await.expect("fetch");
        assert_eq!(value, b"value:Tom");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ownership_agrees_across_pools() {
    let group = Group::new("e2e-origin", 1 << 20, echo_source());

    let (pool_a, addr_a) = start_node().await;
    let (pool_b, addr_b) = start_node().await;
    pool_a.set_peers([addr_a.as_str(), addr_b.as_str()]);
    pool_b.set_peers([addr_a.as_str(), addr_b.as_str()]);
    group.register_peers(Arc::clone(&pool_b) as Arc<dyn PeerPicker>);

    // From node A's perspective, find a key the other node owns; both rings
    // are built from the same peer list, so node B must agree it is the
    // owner and answer from its own source.
    let (key, fetcher) = (0..256)
        .find_map(|i| {
            let key = format!("key-{i}");
            pool_a.pick_peer(&key).map(|fetcher| (key, fetcher))
        })
        .expect("some key owned by the other node");

    let value = fetcher.fetch("e2e-origin", &key).await.expect("remote fetch");
    assert_eq!(value, format!("value:{key}").into_bytes());
}
