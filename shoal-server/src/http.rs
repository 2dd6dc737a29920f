//! # Peer Protocol Handler
//!
//! Serves `GET {base_path}{group}/{key}` to other nodes. The group and key
//! segments arrive percent-encoded; the handler splits the raw path first
//! and decodes each segment afterwards, so keys containing `/` survive.
//!
//! Status mapping: `400` for a malformed path, `404` for an unregistered
//! group, `500` for a failed load, `200` with an octet-stream body (the
//! encoded wire message) on success.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;
use prost::Message;

use shoal_cache::get_group;
use shoal_common::{CacheError, FetchResponse};

use crate::pool::HttpPool;

impl HttpPool {
    /// Builds the router serving this pool's peer protocol.
    ///
    /// The handler is installed as the fallback so it observes every path;
    /// anything outside the pool's base path is a wiring mistake, not a
    /// client error.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(serve).with_state(self)
    }
}

async fn serve(State(pool): State<Arc<HttpPool>>, uri: Uri) -> Response {
    let path = uri.path();
    if !path.starts_with(pool.base_path()) {
        panic!("HttpPool serving unexpected path: {path}");
    }
    tracing::info!(server = %pool.self_addr(), path, "GET");

    let rest = &path[pool.base_path().len()..];
    let Some((group_name, key)) = split_group_key(rest) else {
        return (StatusCode::BAD_REQUEST, "bad request").into_response();
    };

    let Some(group) = get_group(&group_name) else {
        let err = CacheError::NoSuchGroup(group_name);
        return (StatusCode::NOT_FOUND, err.to_string()).into_response();
    };

    match group.get(&key).await {
        Ok(view) => {
            let body = FetchResponse {
                value: view.to_vec(),
            }
            .encode_to_vec();
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                body,
            )
                .into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Splits `{group}/{key}` (both percent-encoded) and decodes the segments.
/// Returns `None` when either segment is missing, empty, or not UTF-8.
fn split_group_key(rest: &str) -> Option<(String, String)> {
    let (group, key) = rest.split_once('/')?;
    if group.is_empty() || key.is_empty() {
        return None;
    }

    let group = percent_decode_str(group).decode_utf8().ok()?.into_owned();
    let key = percent_decode_str(key).decode_utf8().ok()?.into_owned();
    Some((group, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_decodes_segments() {
        assert_eq!(
            split_group_key("scores/Tom"),
            Some(("scores".to_string(), "Tom".to_string()))
        );
        assert_eq!(
            split_group_key("my%20group/a%2Fb%25c"),
            Some(("my group".to_string(), "a/b%c".to_string()))
        );
    }

    #[test]
    fn malformed_paths_are_rejected() {
        assert_eq!(split_group_key(""), None);
        assert_eq!(split_group_key("scores"), None);
        assert_eq!(split_group_key("scores/"), None);
        assert_eq!(split_group_key("/Tom"), None);
    }
}
