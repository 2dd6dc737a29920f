//! Shoalcache node binary.
//!
//! Runs one cache node: the peer-facing HTTP server, a demo group backed by
//! a small in-memory table, and optionally a user-facing API server with a
//! plain `GET /api?key=` endpoint plus `GET /stats` for the group counters.
//!
//! A three-node local mesh:
//!
//! ```text
//! shoal-server --addr 127.0.0.1:8001 --peers 127.0.0.1:8001,127.0.0.1:8002,127.0.0.1:8003 \
//!              --api-addr 127.0.0.1:9999
//! shoal-server --addr 127.0.0.1:8002 --peers 127.0.0.1:8001,127.0.0.1:8002,127.0.0.1:8003
//! shoal-server --addr 127.0.0.1:8003 --peers 127.0.0.1:8001,127.0.0.1:8002,127.0.0.1:8003
//! ```

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shoal_cache::{Group, PeerPicker, SourceFn, StatsSnapshot};
use shoal_common::BoxError;
use shoal_server::HttpPool;

/// Demo rows served by the backing source when the whole mesh misses.
const SCORES: [(&str, &str); 3] = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")];

#[derive(Parser, Debug)]
#[command(name = "shoal-server", about = "Shoalcache node")]
struct Args {
    /// Address this node listens on for peer traffic.
    #[arg(long, default_value = "127.0.0.1:8001")]
    addr: String,

    /// Comma-separated peer addresses forming the mesh (including this
    /// node). Defaults to a single-node mesh.
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Optional address for the user-facing API server.
    #[arg(long)]
    api_addr: Option<String>,

    /// Local cache budget in bytes per group (0 = unbounded).
    #[arg(long, default_value_t = 2 << 20)]
    cache_bytes: usize,
}

fn lookup_score(key: &str) -> Result<Vec<u8>, BoxError> {
    tracing::info!(key, "backing source consulted");
    SCORES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, score)| score.as_bytes().to_vec())
        .ok_or_else(|| format!("{key} not exist").into())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let group = Group::new(
        "scores",
        args.cache_bytes,
        Arc::new(SourceFn(|key: String| async move { lookup_score(&key) })),
    );

    let pool = Arc::new(HttpPool::new(&args.addr));
    if args.peers.is_empty() {
        pool.set_peers([args.addr.as_str()]);
    } else {
        pool.set_peers(&args.peers);
    }
    group.register_peers(Arc::clone(&pool) as Arc<dyn PeerPicker>);

    if let Some(api_addr) = args.api_addr {
        let api_group = Arc::clone(&group);
        tokio::spawn(async move {
            if let Err(err) = serve_api(api_addr, api_group).await {
                tracing::error!(error = %err, "api server failed");
            }
        });
    }

    tracing::info!(addr = %args.addr, "cache server running");
    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    axum::serve(listener, pool.router()).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    key: String,
}

/// Serves the user-facing endpoints: raw values and group statistics.
async fn serve_api(addr: String, group: Arc<Group>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api", get(api_get))
        .route("/stats", get(api_stats))
        .with_state(group);

    tracing::info!(addr = %addr, "api server running");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn api_get(State(group): State<Arc<Group>>, Query(query): Query<ApiQuery>) -> Response {
    match group.get(&query.key).await {
        Ok(view) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn api_stats(State(group): State<Arc<Group>>) -> Json<StatsSnapshot> {
    Json(group.stats())
}
